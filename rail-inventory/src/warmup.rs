//! Lazy population of a train's token bucket.
//!
//! A cold bucket is rebuilt from the authoritative store at most once per cold
//! period: a cheap existence probe, then a per-train distributed lock, then a
//! second probe under the lock before the rebuild. The rebuild writes only
//! fields that are still missing, so a reservation that slipped in between
//! the probe and the write is never clobbered.

use rail_core::cache::{DistributedLock, TokenCache};
use rail_core::repository::{RouteService, TrainRepository};
use rail_core::{Segment, TrainId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::accessor::SegmentStoreAccessor;
use crate::error::InventoryError;
use crate::keys::BucketKeys;
use crate::InventoryDeps;

#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    /// How long a warm-up may hold the lock before it expires on its own.
    pub lease: Duration,
    /// How long a caller waits for a busy lock before giving up.
    pub wait: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            wait: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warmup {
    /// Taken on trust from this process's own mark; the cache was not probed.
    Remembered,
    AlreadyWarm,
    Built { fields: u64 },
}

pub struct WarmupCoordinator {
    trains: Arc<dyn TrainRepository>,
    routes: Arc<dyn RouteService>,
    accessor: SegmentStoreAccessor,
    cache: Arc<dyn TokenCache>,
    lock: Arc<dyn DistributedLock>,
    keys: BucketKeys,
    policy: LockPolicy,
    // Trains this process has seen warm; advisory, reset on invalidation.
    known_warm: RwLock<HashSet<TrainId>>,
}

impl WarmupCoordinator {
    pub fn new(deps: &InventoryDeps, keys: BucketKeys, policy: LockPolicy) -> Self {
        Self {
            trains: deps.trains.clone(),
            routes: deps.routes.clone(),
            accessor: SegmentStoreAccessor::new(deps.seats.clone()),
            cache: deps.cache.clone(),
            lock: deps.lock.clone(),
            keys,
            policy,
            known_warm: RwLock::new(HashSet::new()),
        }
    }

    pub fn keys(&self) -> &BucketKeys {
        &self.keys
    }

    pub async fn ensure_warm(&self, train_id: TrainId) -> Result<Warmup, InventoryError> {
        if self.known_warm.read().await.contains(&train_id) {
            return Ok(Warmup::Remembered);
        }

        let bucket_key = self.keys.bucket_key(train_id);
        if self.cache.exists(&bucket_key).await? {
            debug!(%train_id, "Token bucket already warm");
            self.mark_warm(train_id).await;
            return Ok(Warmup::AlreadyWarm);
        }

        let lock_key = self.keys.lock_key(train_id);
        let token = match self
            .lock
            .try_acquire(&lock_key, self.policy.lease, self.policy.wait)
            .await?
        {
            Some(token) => token,
            None => {
                // Whoever held the lock may have finished the rebuild.
                if self.cache.exists(&bucket_key).await? {
                    self.mark_warm(train_id).await;
                    return Ok(Warmup::AlreadyWarm);
                }
                warn!(%train_id, "Token bucket warm-up lock busy");
                return Err(InventoryError::WarmupBusy(train_id));
            }
        };

        let populated = self.populate(train_id, &bucket_key).await;

        match self.lock.release(token).await {
            Ok(()) => {}
            Err(release_err) => {
                error!(%train_id, error = %release_err, "Failed to release warm-up lock");
                if populated.is_ok() {
                    return Err(release_err.into());
                }
            }
        }

        let warmup = populated?;
        self.mark_warm(train_id).await;
        Ok(warmup)
    }

    /// Drops the local "known warm" mark so the next call probes the cache again.
    pub async fn forget(&self, train_id: TrainId) {
        self.known_warm.write().await.remove(&train_id);
    }

    async fn mark_warm(&self, train_id: TrainId) {
        self.known_warm.write().await.insert(train_id);
    }

    async fn populate(&self, train_id: TrainId, bucket_key: &str) -> Result<Warmup, InventoryError> {
        if self.cache.exists(bucket_key).await? {
            return Ok(Warmup::AlreadyWarm);
        }

        let bucket = self.build_bucket(train_id).await?;
        let fields = self.cache.hash_put_missing(bucket_key, &bucket).await?;
        info!(%train_id, fields, "Token bucket built");
        Ok(Warmup::Built { fields })
    }

    /// Computes the full `(segment, seat type) -> count` mapping from the
    /// authoritative store without touching the cache.
    pub async fn build_bucket(&self, train_id: TrainId) -> Result<BTreeMap<String, i64>, InventoryError> {
        let train = self
            .trains
            .find_train(train_id)
            .await?
            .ok_or(InventoryError::TrainNotFound(train_id))?;
        let seat_types = train.train_class.seat_types();

        let segments = self
            .routes
            .train_route_segments(train_id, &train.start_station, &train.end_station)
            .await?;

        let mut bucket = BTreeMap::new();

        if segments.is_empty() {
            // An un-routed train sells nothing until its route is fixed.
            warn!(%train_id, "Train has no route segments, initialising an empty bucket");
            let whole = Segment::new(&train.start_station, &train.end_station);
            for &seat_type in seat_types {
                bucket.insert(BucketKeys::field(&whole, seat_type), 0);
            }
            return Ok(bucket);
        }

        for segment in &segments {
            let counts = self
                .accessor
                .read_segment_counts(train_id, seat_types, segment)
                .await?;
            for (seat_type, count) in counts {
                let count = i64::try_from(count).unwrap_or(i64::MAX);
                bucket.insert(BucketKeys::field(segment, seat_type), count);
            }
        }

        Ok(bucket)
    }
}
