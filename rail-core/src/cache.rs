//! Boundary of the shared key-value cache and the distributed lock.
//!
//! Bucket mutation only ever happens through [`TokenCache::run_atomic`]; a
//! backend must run each [`BucketScript`] without interleaving with any other
//! mutator of the same key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::train::SeatType;
use crate::CoreResult;

/// Server-side transactions a backend must be able to run atomically.
///
/// Both take `KEYS[1]` = bucket key, `ARGV[1]` = JSON `[SeatTypeCount]`,
/// `ARGV[2]` = JSON `[Segment]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketScript {
    /// All-or-nothing decrement. Replies nil when the bucket is absent,
    /// otherwise a JSON [`TokenReply`].
    TakeTokens,
    /// Unconditional increment. Replies `0`, or `-1` when the bucket is absent.
    RollbackTokens,
}

impl BucketScript {
    pub fn name(self) -> &'static str {
        match self {
            BucketScript::TakeTokens => "take_tokens",
            BucketScript::RollbackTokens => "rollback_tokens",
        }
    }
}

/// Rollback reply code for a bucket that no longer exists.
pub const ROLLBACK_BUCKET_MISSING: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    Nil,
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatTypeCount {
    pub seat_type: SeatType,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReply {
    pub success: bool,
    #[serde(default)]
    pub insufficient_seat_types: Vec<SeatType>,
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn exists(&self, key: &str) -> CoreResult<bool>;

    /// Writes every field not already present, in one atomic step.
    /// Returns how many fields were written.
    async fn hash_put_missing(&self, key: &str, entries: &BTreeMap<String, i64>) -> CoreResult<u64>;

    async fn hash_get_all(&self, key: &str) -> CoreResult<BTreeMap<String, i64>>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> CoreResult<bool>;

    async fn run_atomic(
        &self,
        script: BucketScript,
        keys: &[String],
        args: &[String],
    ) -> CoreResult<ScriptReply>;
}

/// Proof of a held lock, handed back on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub owner: String,
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Tries to take `key` for `lease`, polling for at most `wait`.
    /// `Ok(None)` means the lock stayed busy.
    async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> CoreResult<Option<LockToken>>;

    async fn release(&self, token: LockToken) -> CoreResult<()>;
}
