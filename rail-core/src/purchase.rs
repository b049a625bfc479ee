use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::train::{SeatType, TrainId};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerSeat {
    pub passenger_id: String,
    pub seat_type: SeatType,
}

impl PassengerSeat {
    pub fn new(passenger_id: impl Into<String>, seat_type: SeatType) -> Self {
        Self {
            passenger_id: passenger_id.into(),
            seat_type,
        }
    }
}

/// A purchase attempt: one requested seat per passenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub train_id: TrainId,
    pub departure: String,
    pub arrival: String,
    pub passengers: Vec<PassengerSeat>,
}

impl PurchaseRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.passengers.is_empty() {
            return Err(CoreError::ValidationError(
                "Purchase request has no passengers".to_string(),
            ));
        }
        if self.departure == self.arrival {
            return Err(CoreError::ValidationError(format!(
                "Departure and arrival are both {}",
                self.departure
            )));
        }
        Ok(())
    }

    pub fn seat_type_counts(&self) -> BTreeMap<SeatType, u32> {
        group_seat_types(&self.passengers)
    }
}

/// The parts of a placed order needed to hand its seats back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_sn: String,
    pub train_id: TrainId,
    pub departure: String,
    pub arrival: String,
    pub passengers: Vec<PassengerSeat>,
}

impl OrderDetail {
    pub fn seat_type_counts(&self) -> BTreeMap<SeatType, u32> {
        group_seat_types(&self.passengers)
    }
}

/// Groups passengers by requested seat type.
pub fn group_seat_types(passengers: &[PassengerSeat]) -> BTreeMap<SeatType, u32> {
    let mut counts = BTreeMap::new();
    for passenger in passengers {
        *counts.entry(passenger.seat_type).or_insert(0) += 1;
    }
    counts
}

/// Result of trying to take tokens for a purchase.
///
/// `indeterminate` means the bucket could not be evaluated at all; the caller
/// should retry or verify against the database instead of rejecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOutcome {
    pub success: bool,
    pub indeterminate: bool,
    pub insufficient_seat_types: BTreeSet<SeatType>,
}

impl TokenOutcome {
    pub fn granted() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn insufficient(seat_types: impl IntoIterator<Item = SeatType>) -> Self {
        Self {
            success: false,
            indeterminate: false,
            insufficient_seat_types: seat_types.into_iter().collect(),
        }
    }

    pub fn indeterminate() -> Self {
        Self {
            indeterminate: true,
            ..Default::default()
        }
    }

    /// A definite capacity rejection.
    pub fn is_rejected(&self) -> bool {
        !self.success && !self.indeterminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(passengers: Vec<PassengerSeat>) -> PurchaseRequest {
        PurchaseRequest {
            train_id: TrainId(1),
            departure: "A".to_string(),
            arrival: "C".to_string(),
            passengers,
        }
    }

    #[test]
    fn test_group_by_seat_type() {
        let req = request(vec![
            PassengerSeat::new("p1", SeatType(0)),
            PassengerSeat::new("p2", SeatType(2)),
            PassengerSeat::new("p3", SeatType(0)),
        ]);
        let counts = req.seat_type_counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&SeatType(0)], 2);
        assert_eq!(counts[&SeatType(2)], 1);
    }

    #[test]
    fn test_validation() {
        assert!(request(vec![]).validate().is_err());

        let mut same_station = request(vec![PassengerSeat::new("p1", SeatType(0))]);
        same_station.arrival = "A".to_string();
        assert!(same_station.validate().is_err());

        assert!(request(vec![PassengerSeat::new("p1", SeatType(0))])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_outcome_kinds() {
        assert!(TokenOutcome::granted().success);
        assert!(TokenOutcome::insufficient([SeatType(1)]).is_rejected());
        assert!(!TokenOutcome::indeterminate().is_rejected());
    }
}
