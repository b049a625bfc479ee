use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(pub i64);

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer seat-type code. Legal codes for a train come from its [`TrainClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatType(pub u32);

impl SeatType {
    pub const BUSINESS_CLASS: SeatType = SeatType(0);
    pub const FIRST_CLASS: SeatType = SeatType(1);
    pub const SECOND_CLASS: SeatType = SeatType(2);
    pub const SECOND_CLASS_CABIN_SEAT: SeatType = SeatType(3);
    pub const FIRST_SLEEPER: SeatType = SeatType(4);
    pub const SECOND_SLEEPER: SeatType = SeatType(5);
    pub const SOFT_SLEEPER: SeatType = SeatType(6);
    pub const HARD_SLEEPER: SeatType = SeatType(7);
    pub const HARD_SEAT: SeatType = SeatType(8);
    pub const NO_SEAT_SLEEPER: SeatType = SeatType(13);
}

impl fmt::Display for SeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const HIGH_SPEED_SEATS: [SeatType; 3] = [
    SeatType::BUSINESS_CLASS,
    SeatType::FIRST_CLASS,
    SeatType::SECOND_CLASS,
];

const BULLET_SEATS: [SeatType; 4] = [
    SeatType::SECOND_CLASS_CABIN_SEAT,
    SeatType::FIRST_SLEEPER,
    SeatType::SECOND_SLEEPER,
    SeatType::NO_SEAT_SLEEPER,
];

const REGULAR_SEATS: [SeatType; 4] = [
    SeatType::SOFT_SLEEPER,
    SeatType::HARD_SLEEPER,
    SeatType::HARD_SEAT,
    SeatType::NO_SEAT_SLEEPER,
];

/// Train class; decides which seat types may be sold on a train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainClass {
    HighSpeed,
    Bullet,
    Regular,
}

impl TrainClass {
    pub fn from_code(code: i32) -> CoreResult<Self> {
        match code {
            0 => Ok(TrainClass::HighSpeed),
            1 => Ok(TrainClass::Bullet),
            2 => Ok(TrainClass::Regular),
            other => Err(CoreError::ValidationError(format!(
                "Unknown train class code: {}",
                other
            ))),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            TrainClass::HighSpeed => 0,
            TrainClass::Bullet => 1,
            TrainClass::Regular => 2,
        }
    }

    pub fn seat_types(self) -> &'static [SeatType] {
        match self {
            TrainClass::HighSpeed => &HIGH_SPEED_SEATS,
            TrainClass::Bullet => &BULLET_SEATS,
            TrainClass::Regular => &REGULAR_SEATS,
        }
    }

    pub fn allows(self, seat_type: SeatType) -> bool {
        self.seat_types().contains(&seat_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub train_number: String,
    pub train_class: TrainClass,
    pub start_station: String,
    pub end_station: String,
}

/// An independently tracked station pair on a train's route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_station: String,
    pub end_station: String,
}

impl Segment {
    pub fn new(start_station: impl Into<String>, end_station: impl Into<String>) -> Self {
        Self {
            start_station: start_station.into(),
            end_station: end_station.into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.start_station, self.end_station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_class_codes() {
        assert_eq!(TrainClass::from_code(0).unwrap(), TrainClass::HighSpeed);
        assert_eq!(TrainClass::from_code(2).unwrap().code(), 2);
        assert!(matches!(
            TrainClass::from_code(7),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_seat_types_per_class() {
        assert_eq!(
            TrainClass::HighSpeed.seat_types(),
            &[SeatType(0), SeatType(1), SeatType(2)]
        );
        assert!(TrainClass::Bullet.allows(SeatType::NO_SEAT_SLEEPER));
        assert!(TrainClass::Regular.allows(SeatType::HARD_SEAT));
        assert!(!TrainClass::Regular.allows(SeatType::BUSINESS_CLASS));
    }

    #[test]
    fn test_segment_wire_names() {
        let json = serde_json::to_string(&Segment::new("A", "B")).unwrap();
        assert_eq!(json, r#"{"startStation":"A","endStation":"B"}"#);
        assert_eq!(serde_json::to_string(&SeatType(13)).unwrap(), "13");
    }
}
