use rail_core::{Segment, SeatType, TrainId};

/// Cache key layout of the token buckets.
///
/// A bucket is one hash per train; its fields are `<start>_<end>_<seatType>`.
#[derive(Debug, Clone)]
pub struct BucketKeys {
    bucket_prefix: String,
    lock_prefix: String,
}

impl BucketKeys {
    pub fn new(bucket_prefix: impl Into<String>, lock_prefix: impl Into<String>) -> Self {
        Self {
            bucket_prefix: bucket_prefix.into(),
            lock_prefix: lock_prefix.into(),
        }
    }

    pub fn bucket_key(&self, train_id: TrainId) -> String {
        format!("{}{}", self.bucket_prefix, train_id)
    }

    pub fn lock_key(&self, train_id: TrainId) -> String {
        format!("{}{}", self.lock_prefix, train_id)
    }

    pub fn field(segment: &Segment, seat_type: SeatType) -> String {
        format!("{}_{}_{}", segment.start_station, segment.end_station, seat_type)
    }

    /// Splits a field back into segment and seat type. Station names may not
    /// contain `_` in the end station position.
    pub fn parse_field(field: &str) -> Option<(Segment, SeatType)> {
        let mut parts = field.rsplitn(3, '_');
        let seat_type = parts.next()?.parse::<u32>().ok()?;
        let end_station = parts.next()?;
        let start_station = parts.next()?;
        if start_station.is_empty() || end_station.is_empty() {
            return None;
        }
        Some((Segment::new(start_station, end_station), SeatType(seat_type)))
    }
}
