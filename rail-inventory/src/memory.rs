//! In-memory collaborators for tests and local runs.
//!
//! [`MemoryTokenCache`] runs both bucket scripts while holding one mutex, which
//! gives the same no-interleaving guarantee a Redis script has.

use async_trait::async_trait;
use rail_core::cache::{
    BucketScript, DistributedLock, LockToken, ScriptReply, SeatTypeCount, TokenCache, TokenReply,
    ROLLBACK_BUCKET_MISSING,
};
use rail_core::repository::{SeatRepository, TrainRepository, TrainStationRepository};
use rail_core::{CoreError, CoreResult, Segment, SeatType, Train, TrainId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::keys::BucketKeys;

type Hashes = HashMap<String, BTreeMap<String, i64>>;

#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    hashes: Mutex<Hashes>,
    offline: AtomicBool,
    script_runs: AtomicUsize,
    vanish_before_script: Mutex<Option<String>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with a cache error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn script_runs(&self) -> usize {
        self.script_runs.load(Ordering::SeqCst)
    }

    /// Deletes `key` right before the next script runs, once. Models an
    /// invalidation landing between the warm-up probe and the script.
    pub fn vanish_before_next_script(&self, key: &str) {
        if let Ok(mut armed) = self.vanish_before_script.lock() {
            *armed = Some(key.to_string());
        }
    }

    fn hashes(&self) -> CoreResult<MutexGuard<'_, Hashes>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::CacheError("cache is unreachable".to_string()));
        }
        self.hashes
            .lock()
            .map_err(|_| CoreError::CacheError("cache mutex poisoned".to_string()))
    }
}

fn decode_args(args: &[String]) -> CoreResult<(Vec<SeatTypeCount>, Vec<Segment>)> {
    let (counts, segments) = match args {
        [counts, segments] => (counts, segments),
        _ => {
            return Err(CoreError::CacheError(format!(
                "bucket scripts take 2 arguments, got {}",
                args.len()
            )))
        }
    };
    let counts = serde_json::from_str(counts)
        .map_err(|e| CoreError::CacheError(format!("bad seat type counts: {}", e)))?;
    let segments = serde_json::from_str(segments)
        .map_err(|e| CoreError::CacheError(format!("bad segments: {}", e)))?;
    Ok((counts, segments))
}

fn take_tokens(
    bucket: Option<&mut BTreeMap<String, i64>>,
    counts: &[SeatTypeCount],
    segments: &[Segment],
) -> CoreResult<ScriptReply> {
    let bucket = match bucket {
        Some(bucket) => bucket,
        None => return Ok(ScriptReply::Nil),
    };

    let mut insufficient = Vec::new();
    for entry in counts {
        for segment in segments {
            let field = BucketKeys::field(segment, entry.seat_type);
            if bucket.get(&field).copied().unwrap_or(0) < i64::from(entry.count) {
                insufficient.push(entry.seat_type);
                break;
            }
        }
    }

    if insufficient.is_empty() {
        for entry in counts {
            for segment in segments {
                *bucket
                    .entry(BucketKeys::field(segment, entry.seat_type))
                    .or_insert(0) -= i64::from(entry.count);
            }
        }
    }

    let reply = TokenReply {
        success: insufficient.is_empty(),
        insufficient_seat_types: insufficient,
    };
    serde_json::to_string(&reply)
        .map(ScriptReply::Text)
        .map_err(|e| CoreError::CacheError(e.to_string()))
}

fn rollback_tokens(
    bucket: Option<&mut BTreeMap<String, i64>>,
    counts: &[SeatTypeCount],
    segments: &[Segment],
) -> ScriptReply {
    let bucket = match bucket {
        Some(bucket) => bucket,
        None => return ScriptReply::Int(ROLLBACK_BUCKET_MISSING),
    };
    for entry in counts {
        for segment in segments {
            *bucket
                .entry(BucketKeys::field(segment, entry.seat_type))
                .or_insert(0) += i64::from(entry.count);
        }
    }
    ScriptReply::Int(0)
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.hashes()?.contains_key(key))
    }

    async fn hash_put_missing(&self, key: &str, entries: &BTreeMap<String, i64>) -> CoreResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut hashes = self.hashes()?;
        let hash = hashes.entry(key.to_string()).or_default();
        let mut written = 0;
        for (field, value) in entries {
            if !hash.contains_key(field) {
                hash.insert(field.clone(), *value);
                written += 1;
            }
        }
        Ok(written)
    }

    async fn hash_get_all(&self, key: &str) -> CoreResult<BTreeMap<String, i64>> {
        Ok(self.hashes()?.get(key).cloned().unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        Ok(self.hashes()?.remove(key).is_some())
    }

    async fn run_atomic(
        &self,
        script: BucketScript,
        keys: &[String],
        args: &[String],
    ) -> CoreResult<ScriptReply> {
        let key = keys
            .first()
            .ok_or_else(|| CoreError::CacheError("bucket scripts need a key".to_string()))?;
        let (counts, segments) = decode_args(args)?;

        let mut hashes = self.hashes()?;
        if let Some(vanished) = self.vanish_before_script.lock().ok().and_then(|mut armed| armed.take()) {
            hashes.remove(&vanished);
        }
        self.script_runs.fetch_add(1, Ordering::SeqCst);
        let bucket = hashes.get_mut(key);
        match script {
            BucketScript::TakeTokens => take_tokens(bucket, &counts, &segments),
            BucketScript::RollbackTokens => Ok(rollback_tokens(bucket, &counts, &segments)),
        }
    }
}

/// Lease-based lock with polling acquisition.
#[derive(Debug)]
pub struct MemoryLock {
    held: Mutex<HashMap<String, (String, Instant)>>,
    retry: Duration,
    next_owner: AtomicUsize,
    acquisitions: AtomicUsize,
    offline: AtomicBool,
}

impl Default for MemoryLock {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

impl MemoryLock {
    pub fn new(retry: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            retry,
            next_owner: AtomicUsize::new(0),
            acquisitions: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.get(key).is_some_and(|(_, expires)| *expires > Instant::now()))
            .unwrap_or(false)
    }

    fn try_once(&self, key: &str, owner: &str, lease: Duration) -> CoreResult<bool> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::LockError("lock service is unreachable".to_string()));
        }
        let mut held = self
            .held
            .lock()
            .map_err(|_| CoreError::LockError("lock mutex poisoned".to_string()))?;
        let now = Instant::now();
        if held.get(key).is_some_and(|(_, expires)| *expires > now) {
            return Ok(false);
        }
        held.insert(key.to_string(), (owner.to_string(), now + lease));
        Ok(true)
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> CoreResult<Option<LockToken>> {
        let owner = format!("owner-{}", self.next_owner.fetch_add(1, Ordering::SeqCst));
        let deadline = Instant::now() + wait;
        loop {
            if self.try_once(key, &owner, lease)? {
                self.acquisitions.fetch_add(1, Ordering::SeqCst);
                return Ok(Some(LockToken {
                    key: key.to_string(),
                    owner,
                }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.retry).await;
        }
    }

    async fn release(&self, token: LockToken) -> CoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::LockError("lock service is unreachable".to_string()));
        }
        let mut held = self
            .held
            .lock()
            .map_err(|_| CoreError::LockError("lock mutex poisoned".to_string()))?;
        if held.get(&token.key).is_some_and(|(owner, _)| *owner == token.owner) {
            held.remove(&token.key);
        }
        Ok(())
    }
}

/// Trains, stop lists and seat counts, with read counters.
#[derive(Debug, Default)]
pub struct MemoryRailStore {
    trains: Mutex<HashMap<TrainId, Train>>,
    stations: Mutex<HashMap<TrainId, Vec<String>>>,
    available: Mutex<HashMap<(TrainId, SeatType, Segment), u64>>,
    read_delay: Option<Duration>,
    fail_seat_reads: AtomicBool,
    train_reads: AtomicUsize,
    seat_reads: AtomicUsize,
}

impl MemoryRailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slows every train read, to widen race windows in tests.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn add_train(&self, train: Train, stations: &[&str]) {
        let stops = stations.iter().map(|s| s.to_string()).collect();
        if let Ok(mut all) = self.stations.lock() {
            all.insert(train.id, stops);
        }
        if let Ok(mut trains) = self.trains.lock() {
            trains.insert(train.id, train);
        }
    }

    pub fn set_available(&self, train_id: TrainId, seat_type: SeatType, segment: Segment, count: u64) {
        if let Ok(mut available) = self.available.lock() {
            available.insert((train_id, seat_type, segment), count);
        }
    }

    pub fn set_fail_seat_reads(&self, fail: bool) {
        self.fail_seat_reads.store(fail, Ordering::SeqCst);
    }

    pub fn train_reads(&self) -> usize {
        self.train_reads.load(Ordering::SeqCst)
    }

    pub fn seat_reads(&self) -> usize {
        self.seat_reads.load(Ordering::SeqCst)
    }
}

fn poisoned() -> CoreError {
    CoreError::StoreError("store mutex poisoned".to_string())
}

#[async_trait]
impl TrainRepository for MemoryRailStore {
    async fn find_train(&self, train_id: TrainId) -> CoreResult<Option<Train>> {
        self.train_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.trains.lock().map_err(|_| poisoned())?.get(&train_id).cloned())
    }
}

#[async_trait]
impl SeatRepository for MemoryRailStore {
    async fn count_available_seats(
        &self,
        train_id: TrainId,
        seat_type: SeatType,
        segment: &Segment,
    ) -> CoreResult<u64> {
        self.seat_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_seat_reads.load(Ordering::SeqCst) {
            return Err(CoreError::StoreError("seat table unreachable".to_string()));
        }
        let available = self.available.lock().map_err(|_| poisoned())?;
        Ok(available
            .get(&(train_id, seat_type, segment.clone()))
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl TrainStationRepository for MemoryRailStore {
    async fn list_stations(&self, train_id: TrainId) -> CoreResult<Vec<String>> {
        Ok(self
            .stations
            .lock()
            .map_err(|_| poisoned())?
            .get(&train_id)
            .cloned()
            .unwrap_or_default())
    }
}
