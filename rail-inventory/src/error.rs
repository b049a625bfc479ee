use rail_core::{CoreError, SeatType, TrainId};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Train not found: {0}")]
    TrainNotFound(TrainId),

    #[error("Journey {departure} -> {arrival} is not on the route of train {train_id}")]
    UnknownJourney {
        train_id: TrainId,
        departure: String,
        arrival: String,
    },

    #[error("Token bucket for train {0} is being rebuilt, retry later")]
    WarmupBusy(TrainId),

    #[error("Failed to read seat type {seat_type} on {segment} for train {train_id}: {source}")]
    SegmentRead {
        train_id: TrainId,
        seat_type: SeatType,
        segment: String,
        #[source]
        source: CoreError,
    },

    #[error("Failed to roll back tokens of order {order_sn} on train {train_id}: {reason}")]
    RollbackFailed {
        train_id: TrainId,
        order_sn: String,
        reason: String,
    },

    #[error("Script payload encoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl InventoryError {
    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        match self {
            InventoryError::WarmupBusy(_) => true,
            InventoryError::Core(err) => err.is_transient(),
            _ => false,
        }
    }
}
