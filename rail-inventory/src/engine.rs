use rail_core::cache::{
    BucketScript, ScriptReply, SeatTypeCount, TokenCache, TokenReply, ROLLBACK_BUCKET_MISSING,
};
use rail_core::repository::RouteService;
use rail_core::{OrderDetail, PurchaseRequest, Segment, SeatType, TokenOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::InventoryError;
use crate::warmup::{Warmup, WarmupCoordinator};

/// Takes and returns seat tokens through the bucket scripts.
///
/// Nothing here reads a count and writes it back; every mutation is one
/// atomic script run on the cache server.
pub struct ReservationEngine {
    warmup: Arc<WarmupCoordinator>,
    routes: Arc<dyn RouteService>,
    cache: Arc<dyn TokenCache>,
}

impl ReservationEngine {
    pub fn new(
        warmup: Arc<WarmupCoordinator>,
        routes: Arc<dyn RouteService>,
        cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            warmup,
            routes,
            cache,
        }
    }

    /// Takes one token per passenger on every segment the journey overlaps.
    ///
    /// Capacity exhaustion is an `Ok` outcome with `success == false`. A bucket
    /// that vanished after the cache was probed yields an indeterminate
    /// outcome; one that was only remembered as warm is rebuilt and retried once.
    pub async fn take(&self, request: &PurchaseRequest) -> Result<TokenOutcome, InventoryError> {
        request.validate()?;
        let train_id = request.train_id;

        let warmup = self.warmup.ensure_warm(train_id).await?;

        let segments = self
            .routes
            .takeout_segments(train_id, &request.departure, &request.arrival)
            .await?;
        if segments.is_empty() {
            return Err(InventoryError::UnknownJourney {
                train_id,
                departure: request.departure.clone(),
                arrival: request.arrival.clone(),
            });
        }

        let args = script_args(&request.seat_type_counts(), &segments)?;
        let keys = [self.warmup.keys().bucket_key(train_id)];
        let mut reply = self
            .cache
            .run_atomic(BucketScript::TakeTokens, &keys, &args)
            .await?;

        // The local mark outlives invalidations made by other processes.
        if reply == ScriptReply::Nil && warmup == Warmup::Remembered {
            debug!(%train_id, "Remembered bucket is gone, warming again");
            self.warmup.forget(train_id).await;
            self.warmup.ensure_warm(train_id).await?;
            reply = self
                .cache
                .run_atomic(BucketScript::TakeTokens, &keys, &args)
                .await?;
        }

        let outcome = match reply {
            ScriptReply::Text(body) => match serde_json::from_str::<TokenReply>(&body) {
                Ok(reply) if reply.success => TokenOutcome::granted(),
                Ok(reply) => TokenOutcome::insufficient(reply.insufficient_seat_types),
                Err(e) => {
                    warn!(%train_id, error = %e, "Unparseable take reply");
                    TokenOutcome::indeterminate()
                }
            },
            ScriptReply::Nil => TokenOutcome::indeterminate(),
            ScriptReply::Int(code) => {
                warn!(%train_id, code, "Unexpected integer take reply");
                TokenOutcome::indeterminate()
            }
        };

        if outcome.indeterminate {
            warn!(%train_id, "Token bucket missing during take, result indeterminate");
            self.warmup.forget(train_id).await;
        } else if outcome.success {
            debug!(
                %train_id,
                departure = %request.departure,
                arrival = %request.arrival,
                passengers = request.passengers.len(),
                "Tokens taken"
            );
        } else {
            info!(
                %train_id,
                insufficient = ?outcome.insufficient_seat_types,
                "Tokens exhausted"
            );
        }

        Ok(outcome)
    }

    /// Returns an order's tokens to the bucket. Skips warm-up: a bucket a
    /// sale was taken from must still exist.
    pub async fn rollback(&self, order: &OrderDetail) -> Result<(), InventoryError> {
        let train_id = order.train_id;
        let seat_type_counts = order.seat_type_counts();
        if seat_type_counts.is_empty() {
            debug!(order_sn = %order.order_sn, "Order has no passengers, nothing to roll back");
            return Ok(());
        }

        let segments = self
            .routes
            .takeout_segments(train_id, &order.departure, &order.arrival)
            .await?;
        if segments.is_empty() {
            return Err(self.rollback_failed(order, "journey is not on the train route".to_string()));
        }

        let args = script_args(&seat_type_counts, &segments)?;
        let keys = [self.warmup.keys().bucket_key(train_id)];
        let reply = match self
            .cache
            .run_atomic(BucketScript::RollbackTokens, &keys, &args)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(order = ?order, error = %e, "Rollback script failed");
                return Err(e.into());
            }
        };

        match reply {
            ScriptReply::Int(0) => {
                info!(%train_id, order_sn = %order.order_sn, "Tokens rolled back");
                Ok(())
            }
            ScriptReply::Int(ROLLBACK_BUCKET_MISSING) => {
                Err(self.rollback_failed(order, "token bucket does not exist".to_string()))
            }
            other => Err(self.rollback_failed(order, format!("unexpected reply {:?}", other))),
        }
    }

    fn rollback_failed(&self, order: &OrderDetail, reason: String) -> InventoryError {
        error!(order = ?order, %reason, "Failed to roll back train tokens");
        InventoryError::RollbackFailed {
            train_id: order.train_id,
            order_sn: order.order_sn.clone(),
            reason,
        }
    }
}

fn script_args(
    seat_type_counts: &BTreeMap<SeatType, u32>,
    segments: &[Segment],
) -> Result<[String; 2], InventoryError> {
    let counts: Vec<SeatTypeCount> = seat_type_counts
        .iter()
        .map(|(&seat_type, &count)| SeatTypeCount { seat_type, count })
        .collect();
    Ok([serde_json::to_string(&counts)?, serde_json::to_string(segments)?])
}
