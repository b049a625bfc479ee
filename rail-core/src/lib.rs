pub mod train;
pub mod purchase;
pub mod repository;
pub mod route;
pub mod cache;

pub use train::{Segment, SeatType, Train, TrainClass, TrainId};
pub use purchase::{OrderDetail, PassengerSeat, PurchaseRequest, TokenOutcome};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Store read failed: {0}")]
    StoreError(String),
    #[error("Cache operation failed: {0}")]
    CacheError(String),
    #[error("Lock service failed: {0}")]
    LockError(String),
}

impl CoreError {
    /// Infrastructure failures the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::CacheError(_) | CoreError::LockError(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
