use rail_core::repository::SeatRepository;
use rail_core::{Segment, SeatType, TrainId};
use std::sync::Arc;
use tracing::debug;

use crate::error::InventoryError;

/// Reads authoritative available-seat counts per segment and seat type.
#[derive(Clone)]
pub struct SegmentStoreAccessor {
    seats: Arc<dyn SeatRepository>,
}

impl SegmentStoreAccessor {
    pub fn new(seats: Arc<dyn SeatRepository>) -> Self {
        Self { seats }
    }

    /// Any store failure is fatal; a failed read is never taken as zero.
    pub async fn read_segment_count(
        &self,
        train_id: TrainId,
        seat_type: SeatType,
        segment: &Segment,
    ) -> Result<u64, InventoryError> {
        self.seats
            .count_available_seats(train_id, seat_type, segment)
            .await
            .map_err(|source| InventoryError::SegmentRead {
                train_id,
                seat_type,
                segment: segment.to_string(),
                source,
            })
    }

    pub async fn read_segment_counts(
        &self,
        train_id: TrainId,
        seat_types: &[SeatType],
        segment: &Segment,
    ) -> Result<Vec<(SeatType, u64)>, InventoryError> {
        let mut counts = Vec::with_capacity(seat_types.len());
        for &seat_type in seat_types {
            let count = self.read_segment_count(train_id, seat_type, segment).await?;
            counts.push((seat_type, count));
        }
        debug!(%train_id, %segment, ?counts, "Segment counts read");
        Ok(counts)
    }
}
