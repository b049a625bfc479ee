use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::repository::{RouteService, TrainStationRepository};
use crate::train::{Segment, TrainId};
use crate::CoreResult;

/// All stop pairs between `origin` and `destination`, in route order.
pub fn route_segments(stations: &[String], origin: &str, destination: &str) -> Vec<Segment> {
    let (start, end) = match journey_bounds(stations, origin, destination) {
        Some(bounds) => bounds,
        None => return Vec::new(),
    };

    let mut segments = Vec::new();
    for i in start..end {
        for j in (i + 1)..=end {
            segments.push(Segment::new(&stations[i], &stations[j]));
        }
    }
    segments
}

/// Stop pairs of the full route whose interval overlaps `departure..arrival`.
pub fn takeout_segments(stations: &[String], departure: &str, arrival: &str) -> Vec<Segment> {
    let (start, end) = match journey_bounds(stations, departure, arrival) {
        Some(bounds) => bounds,
        None => return Vec::new(),
    };

    let mut segments = Vec::new();
    for i in 0..end {
        for j in (i + 1).max(start + 1)..stations.len() {
            segments.push(Segment::new(&stations[i], &stations[j]));
        }
    }
    segments
}

fn journey_bounds(stations: &[String], from: &str, to: &str) -> Option<(usize, usize)> {
    let start = stations.iter().position(|s| s == from)?;
    let end = stations.iter().position(|s| s == to)?;
    if start >= end {
        return None;
    }
    Some((start, end))
}

/// [`RouteService`] over a train's stop list.
pub struct StationRouteService {
    stations: Arc<dyn TrainStationRepository>,
}

impl StationRouteService {
    pub fn new(stations: Arc<dyn TrainStationRepository>) -> Self {
        Self { stations }
    }
}

#[async_trait]
impl RouteService for StationRouteService {
    async fn train_route_segments(
        &self,
        train_id: TrainId,
        origin: &str,
        destination: &str,
    ) -> CoreResult<Vec<Segment>> {
        let stations = self.stations.list_stations(train_id).await?;
        let segments = route_segments(&stations, origin, destination);
        debug!(%train_id, origin, destination, count = segments.len(), "Route segments resolved");
        Ok(segments)
    }

    async fn takeout_segments(
        &self,
        train_id: TrainId,
        departure: &str,
        arrival: &str,
    ) -> CoreResult<Vec<Segment>> {
        let stations = self.stations.list_stations(train_id).await?;
        Ok(takeout_segments(&stations, departure, arrival))
    }
}
