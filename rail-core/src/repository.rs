use async_trait::async_trait;

use crate::train::{Segment, SeatType, Train, TrainId};
use crate::CoreResult;

/// Authoritative train rows.
#[async_trait]
pub trait TrainRepository: Send + Sync {
    async fn find_train(&self, train_id: TrainId) -> CoreResult<Option<Train>>;
}

/// Authoritative seat rows.
#[async_trait]
pub trait SeatRepository: Send + Sync {
    /// Counts seats of `seat_type` on `segment` that are still available.
    async fn count_available_seats(
        &self,
        train_id: TrainId,
        seat_type: SeatType,
        segment: &Segment,
    ) -> CoreResult<u64>;
}

/// Ordered stop list of a train.
#[async_trait]
pub trait TrainStationRepository: Send + Sync {
    async fn list_stations(&self, train_id: TrainId) -> CoreResult<Vec<String>>;
}

/// Route decomposition into inventory segments.
#[async_trait]
pub trait RouteService: Send + Sync {
    /// Every segment between `origin` and `destination` that is tracked on its own.
    async fn train_route_segments(
        &self,
        train_id: TrainId,
        origin: &str,
        destination: &str,
    ) -> CoreResult<Vec<Segment>>;

    /// The segments a sale from `departure` to `arrival` consumes capacity on.
    async fn takeout_segments(
        &self,
        train_id: TrainId,
        departure: &str,
        arrival: &str,
    ) -> CoreResult<Vec<Segment>>;
}
