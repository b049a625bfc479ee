#![allow(dead_code)]

use rail_core::cache::TokenCache;
use rail_core::route::StationRouteService;
use rail_core::{OrderDetail, PassengerSeat, PurchaseRequest, Segment, SeatType, Train, TrainClass, TrainId};
use rail_inventory::memory::{MemoryLock, MemoryRailStore, MemoryTokenCache};
use rail_inventory::{BucketKeys, InventoryDeps, InventoryOptions, LockPolicy, TicketInventory};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const TRAIN: TrainId = TrainId(1001);

pub struct Fixture {
    pub store: Arc<MemoryRailStore>,
    pub cache: Arc<MemoryTokenCache>,
    pub lock: Arc<MemoryLock>,
    pub inventory: Arc<TicketInventory>,
    pub options: InventoryOptions,
}

impl Fixture {
    pub fn bucket_key(&self, train_id: TrainId) -> String {
        format!("{}{}", self.options.bucket_key_prefix, train_id)
    }

    pub fn lock_key(&self, train_id: TrainId) -> String {
        format!("{}{}", self.options.lock_key_prefix, train_id)
    }

    /// Another service instance over the same store, cache and lock.
    pub fn peer(&self) -> TicketInventory {
        TicketInventory::new(deps(&self.store, &self.cache, &self.lock), self.options.clone())
    }

    pub async fn bucket(&self) -> BTreeMap<String, i64> {
        self.cache.hash_get_all(&self.bucket_key(TRAIN)).await.unwrap()
    }

    pub async fn remaining(&self, start: &str, end: &str, seat_type: u32) -> Option<i64> {
        self.bucket()
            .await
            .get(&BucketKeys::field(&Segment::new(start, end), SeatType(seat_type)))
            .copied()
    }
}

pub fn test_options() -> InventoryOptions {
    InventoryOptions {
        lock: LockPolicy {
            lease: Duration::from_secs(5),
            wait: Duration::from_secs(2),
        },
        ..Default::default()
    }
}

/// Train A -> B -> C, high-speed; business class capacities
/// (A,B)=5, (B,C)=5, (A,C)=3 and first class 2 everywhere.
pub fn scenario_store() -> MemoryRailStore {
    let store = MemoryRailStore::new();
    store.add_train(
        Train {
            id: TRAIN,
            train_number: "G1001".to_string(),
            train_class: TrainClass::HighSpeed,
            start_station: "A".to_string(),
            end_station: "C".to_string(),
        },
        &["A", "B", "C"],
    );
    store.set_available(TRAIN, SeatType(0), Segment::new("A", "B"), 5);
    store.set_available(TRAIN, SeatType(0), Segment::new("B", "C"), 5);
    store.set_available(TRAIN, SeatType(0), Segment::new("A", "C"), 3);
    for segment in [("A", "B"), ("B", "C"), ("A", "C")] {
        store.set_available(TRAIN, SeatType(1), Segment::new(segment.0, segment.1), 2);
    }
    store
}

pub fn fixture_with(store: MemoryRailStore, options: InventoryOptions) -> Fixture {
    let store = Arc::new(store);
    let cache = Arc::new(MemoryTokenCache::new());
    let lock = Arc::new(MemoryLock::default());

    Fixture {
        inventory: Arc::new(TicketInventory::new(deps(&store, &cache, &lock), options.clone())),
        store,
        cache,
        lock,
        options,
    }
}

fn deps(
    store: &Arc<MemoryRailStore>,
    cache: &Arc<MemoryTokenCache>,
    lock: &Arc<MemoryLock>,
) -> InventoryDeps {
    InventoryDeps {
        trains: store.clone(),
        seats: store.clone(),
        routes: Arc::new(StationRouteService::new(store.clone())),
        cache: cache.clone(),
        lock: lock.clone(),
    }
}

pub fn fixture() -> Fixture {
    fixture_with(scenario_store(), test_options())
}

fn passengers(seat_types: &[u32]) -> Vec<PassengerSeat> {
    seat_types
        .iter()
        .enumerate()
        .map(|(i, &seat)| PassengerSeat::new(format!("passenger-{}", i), SeatType(seat)))
        .collect()
}

pub fn purchase(departure: &str, arrival: &str, seat_types: &[u32]) -> PurchaseRequest {
    PurchaseRequest {
        train_id: TRAIN,
        departure: departure.to_string(),
        arrival: arrival.to_string(),
        passengers: passengers(seat_types),
    }
}

pub fn order(order_sn: &str, departure: &str, arrival: &str, seat_types: &[u32]) -> OrderDetail {
    OrderDetail {
        order_sn: order_sn.to_string(),
        train_id: TRAIN,
        departure: departure.to_string(),
        arrival: arrival.to_string(),
        passengers: passengers(seat_types),
    }
}
