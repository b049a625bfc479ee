use rail_core::cache::TokenCache;
use rail_core::{Segment, SeatType, TrainId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::InventoryError;
use crate::keys::BucketKeys;
use crate::warmup::WarmupCoordinator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    pub segment: Segment,
    pub seat_type: SeatType,
    pub remaining: i64,
}

/// A bucket field whose cached value disagrees with the seat table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftEntry {
    pub field: String,
    pub cached: Option<i64>,
    pub authoritative: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub drift: Vec<DriftEntry>,
    pub invalidated: bool,
}

/// Invalidation and inspection of cached buckets.
pub struct BucketLifecycle {
    warmup: Arc<WarmupCoordinator>,
    cache: Arc<dyn TokenCache>,
}

impl BucketLifecycle {
    pub fn new(warmup: Arc<WarmupCoordinator>, cache: Arc<dyn TokenCache>) -> Self {
        Self { warmup, cache }
    }

    /// Drops the cached bucket; the next take rebuilds it from the store.
    pub async fn invalidate(&self, train_id: TrainId) -> Result<(), InventoryError> {
        let removed = self
            .cache
            .delete(&self.warmup.keys().bucket_key(train_id))
            .await?;
        self.warmup.forget(train_id).await;
        info!(%train_id, removed, "Token bucket invalidated");
        Ok(())
    }

    /// Read-only view of the cached bucket. Empty if the train is cold.
    pub async fn snapshot(&self, train_id: TrainId) -> Result<Vec<BucketEntry>, InventoryError> {
        let fields = self
            .cache
            .hash_get_all(&self.warmup.keys().bucket_key(train_id))
            .await?;

        let mut entries = Vec::with_capacity(fields.len());
        for (field, remaining) in fields {
            match BucketKeys::parse_field(&field) {
                Some((segment, seat_type)) => entries.push(BucketEntry {
                    segment,
                    seat_type,
                    remaining,
                }),
                None => warn!(%train_id, %field, "Skipping malformed bucket field"),
            }
        }
        Ok(entries)
    }

    /// Compares the cached bucket with a fresh in-memory rebuild.
    /// A cold bucket has no drift.
    pub async fn detect_drift(&self, train_id: TrainId) -> Result<Vec<DriftEntry>, InventoryError> {
        let cached = self
            .cache
            .hash_get_all(&self.warmup.keys().bucket_key(train_id))
            .await?;
        if cached.is_empty() {
            return Ok(Vec::new());
        }
        let authoritative = self.warmup.build_bucket(train_id).await?;

        let fields: BTreeSet<&String> = cached.keys().chain(authoritative.keys()).collect();
        let drift: Vec<DriftEntry> = fields
            .into_iter()
            .filter_map(|field| {
                let cached_value = cached.get(field).copied();
                let authoritative_value = authoritative.get(field).copied();
                (cached_value != authoritative_value).then(|| DriftEntry {
                    field: field.clone(),
                    cached: cached_value,
                    authoritative: authoritative_value,
                })
            })
            .collect();

        if !drift.is_empty() {
            warn!(%train_id, fields = drift.len(), "Token bucket drifted from seat table");
        }
        Ok(drift)
    }

    /// Invalidates the bucket if it drifted, unless `dry_run` is set.
    pub async fn reconcile(
        &self,
        train_id: TrainId,
        dry_run: bool,
    ) -> Result<Reconciliation, InventoryError> {
        let drift = self.detect_drift(train_id).await?;
        let invalidated = !drift.is_empty() && !dry_run;
        if invalidated {
            self.invalidate(train_id).await?;
        }
        Ok(Reconciliation { drift, invalidated })
    }
}
