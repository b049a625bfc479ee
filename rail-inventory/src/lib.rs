//! Seat inventory reservation over per-train token buckets.
//!
//! A bucket maps `(segment, seat type)` to the number of seats still sellable.
//! It lives in a shared cache, is built lazily from the seat table by
//! [`WarmupCoordinator`], and is mutated only by the atomic take/rollback
//! scripts that [`ReservationEngine`] runs.

pub mod accessor;
pub mod engine;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod memory;
pub mod warmup;

use rail_core::cache::{DistributedLock, TokenCache};
use rail_core::repository::{RouteService, SeatRepository, TrainRepository};
use rail_core::{OrderDetail, PurchaseRequest, TokenOutcome, TrainId};
use std::sync::Arc;

pub use accessor::SegmentStoreAccessor;
pub use engine::ReservationEngine;
pub use error::InventoryError;
pub use keys::BucketKeys;
pub use lifecycle::{BucketEntry, BucketLifecycle, DriftEntry, Reconciliation};
pub use warmup::{LockPolicy, Warmup, WarmupCoordinator};

/// External collaborators the inventory runs against.
#[derive(Clone)]
pub struct InventoryDeps {
    pub trains: Arc<dyn TrainRepository>,
    pub seats: Arc<dyn SeatRepository>,
    pub routes: Arc<dyn RouteService>,
    pub cache: Arc<dyn TokenCache>,
    pub lock: Arc<dyn DistributedLock>,
}

#[derive(Debug, Clone)]
pub struct InventoryOptions {
    pub bucket_key_prefix: String,
    pub lock_key_prefix: String,
    pub lock: LockPolicy,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            bucket_key_prefix: "ticket_availability_token_bucket:".to_string(),
            lock_key_prefix: "lock_ticket_availability_token_bucket:".to_string(),
            lock: LockPolicy::default(),
        }
    }
}

/// The reservation pipeline, wired.
pub struct TicketInventory {
    pub warmup: Arc<WarmupCoordinator>,
    pub engine: ReservationEngine,
    pub lifecycle: BucketLifecycle,
}

impl TicketInventory {
    pub fn new(deps: InventoryDeps, options: InventoryOptions) -> Self {
        let keys = BucketKeys::new(options.bucket_key_prefix, options.lock_key_prefix);
        let warmup = Arc::new(WarmupCoordinator::new(&deps, keys, options.lock));
        let engine = ReservationEngine::new(warmup.clone(), deps.routes.clone(), deps.cache.clone());
        let lifecycle = BucketLifecycle::new(warmup.clone(), deps.cache);
        Self {
            warmup,
            engine,
            lifecycle,
        }
    }

    pub async fn ensure_warm(&self, train_id: TrainId) -> Result<Warmup, InventoryError> {
        self.warmup.ensure_warm(train_id).await
    }

    pub async fn take(&self, request: &PurchaseRequest) -> Result<TokenOutcome, InventoryError> {
        self.engine.take(request).await
    }

    pub async fn rollback(&self, order: &OrderDetail) -> Result<(), InventoryError> {
        self.engine.rollback(order).await
    }

    pub async fn invalidate(&self, train_id: TrainId) -> Result<(), InventoryError> {
        self.lifecycle.invalidate(train_id).await
    }
}
