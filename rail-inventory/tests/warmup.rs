mod common;

use common::*;
use rail_core::cache::DistributedLock;
use rail_core::{CoreError, Segment, SeatType, Train, TrainClass, TrainId};
use rail_inventory::memory::MemoryRailStore;
use rail_inventory::{BucketKeys, InventoryError, LockPolicy, Warmup};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_warmup_reads_store_once() {
    let store = scenario_store().with_read_delay(Duration::from_millis(50));
    let f = fixture_with(store, test_options());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let inventory = f.inventory.clone();
            tokio::spawn(async move { inventory.ensure_warm(TRAIN).await.unwrap() })
        })
        .collect();

    let mut built = 0;
    for handle in handles {
        if let Warmup::Built { fields } = handle.await.unwrap() {
            assert_eq!(fields, 9);
            built += 1;
        }
    }

    assert_eq!(built, 1);
    assert_eq!(f.store.train_reads(), 1);
    // 3 segments x 3 high-speed seat types.
    assert_eq!(f.store.seat_reads(), 9);
    assert_eq!(f.bucket().await.len(), 9);
    assert!(!f.lock.is_held(&f.lock_key(TRAIN)));
}

#[tokio::test]
async fn test_warm_bucket_skips_the_lock() {
    let f = fixture();

    assert!(matches!(f.inventory.ensure_warm(TRAIN).await.unwrap(), Warmup::Built { .. }));
    assert!(matches!(f.inventory.ensure_warm(TRAIN).await.unwrap(), Warmup::Remembered));
    f.inventory.take(&purchase("A", "B", &[0])).await.unwrap();

    assert_eq!(f.lock.acquisitions(), 1);
    assert_eq!(f.store.train_reads(), 1);
}

#[tokio::test]
async fn test_bucket_built_elsewhere_is_adopted() {
    let f = fixture();
    let other = fixture_with(scenario_store(), test_options());

    // A second coordinator sharing nothing but the cache contents.
    other.inventory.ensure_warm(TRAIN).await.unwrap();
    let built = other.bucket().await;
    use rail_core::cache::TokenCache;
    f.cache.hash_put_missing(&f.bucket_key(TRAIN), &built).await.unwrap();

    assert!(matches!(f.inventory.ensure_warm(TRAIN).await.unwrap(), Warmup::AlreadyWarm));
    assert_eq!(f.store.train_reads(), 0);
    assert_eq!(f.lock.acquisitions(), 0);
}

#[tokio::test]
async fn test_bucket_contents_match_seat_table() {
    let f = fixture();
    f.inventory.ensure_warm(TRAIN).await.unwrap();

    let bucket = f.bucket().await;
    let expect = |start: &str, end: &str, seat: u32| {
        bucket
            .get(&BucketKeys::field(&Segment::new(start, end), SeatType(seat)))
            .copied()
    };
    assert_eq!(expect("A", "B", 0), Some(5));
    assert_eq!(expect("A", "C", 0), Some(3));
    assert_eq!(expect("B", "C", 1), Some(2));
    // Second class has no seat rows at all.
    assert_eq!(expect("A", "C", 2), Some(0));
}

#[tokio::test]
async fn test_busy_lock_times_out_as_retryable() {
    let mut options = test_options();
    options.lock = LockPolicy {
        lease: Duration::from_secs(5),
        wait: Duration::from_millis(30),
    };
    let f = fixture_with(scenario_store(), options);

    let held = f
        .lock
        .try_acquire(&f.lock_key(TRAIN), Duration::from_secs(5), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();

    let err = f.inventory.ensure_warm(TRAIN).await.unwrap_err();
    assert!(matches!(err, InventoryError::WarmupBusy(TrainId(1001))));
    assert!(err.is_retryable());
    assert_eq!(f.store.train_reads(), 0);

    f.lock.release(held).await.unwrap();
    assert!(matches!(f.inventory.ensure_warm(TRAIN).await.unwrap(), Warmup::Built { .. }));
}

#[tokio::test]
async fn test_failed_seat_read_writes_nothing() {
    let f = fixture();
    f.store.set_fail_seat_reads(true);

    let err = f.inventory.take(&purchase("A", "C", &[0])).await.unwrap_err();
    match err {
        InventoryError::SegmentRead { train_id, source, .. } => {
            assert_eq!(train_id, TRAIN);
            assert!(matches!(source, CoreError::StoreError(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(f.bucket().await.is_empty());
    assert!(!f.lock.is_held(&f.lock_key(TRAIN)));

    f.store.set_fail_seat_reads(false);
    let outcome = f.inventory.take(&purchase("A", "C", &[0])).await.unwrap();
    assert!(outcome.success);
    assert_eq!(f.remaining("A", "C", 0).await, Some(2));
}

#[tokio::test]
async fn test_unknown_train() {
    let f = fixture();

    let err = f.inventory.ensure_warm(TrainId(42)).await.unwrap_err();
    assert!(matches!(err, InventoryError::TrainNotFound(TrainId(42))));
    assert!(!f.lock.is_held(&f.lock_key(TrainId(42))));
}

#[tokio::test]
async fn test_unrouted_train_gets_zeroed_bucket() {
    let store = MemoryRailStore::new();
    store.add_train(
        Train {
            id: TRAIN,
            train_number: "K7".to_string(),
            train_class: TrainClass::Regular,
            start_station: "X".to_string(),
            end_station: "Y".to_string(),
        },
        &[],
    );
    let f = fixture_with(store, test_options());

    assert!(matches!(
        f.inventory.ensure_warm(TRAIN).await.unwrap(),
        Warmup::Built { fields: 4 }
    ));
    let bucket = f.bucket().await;
    assert_eq!(bucket.len(), 4);
    assert!(bucket.values().all(|&v| v == 0));
    assert!(bucket.contains_key(&BucketKeys::field(&Segment::new("X", "Y"), SeatType::NO_SEAT_SLEEPER)));

    let err = f.inventory.take(&purchase("X", "Y", &[6])).await.unwrap_err();
    assert!(matches!(err, InventoryError::UnknownJourney { .. }));
}

#[tokio::test]
async fn test_lock_outage_is_retryable() {
    let f = fixture();
    f.lock.set_offline(true);

    let err = f.inventory.ensure_warm(TRAIN).await.unwrap_err();
    assert!(matches!(err, InventoryError::Core(CoreError::LockError(_))));
    assert!(err.is_retryable());
}
