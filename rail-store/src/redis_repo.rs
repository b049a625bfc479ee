use async_trait::async_trait;
use rail_core::cache::{BucketScript, DistributedLock, LockToken, ScriptReply, TokenCache};
use rail_core::{CoreError, CoreResult};
use redis::{AsyncCommands, Script, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TAKE_TOKENS_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return nil
end
local seatTypeCounts = cjson.decode(ARGV[1])
local segments = cjson.decode(ARGV[2])
local insufficient = {}
for _, entry in ipairs(seatTypeCounts) do
    local seatType = tostring(entry.seatType)
    local count = tonumber(entry.count)
    for _, segment in ipairs(segments) do
        local field = segment.startStation .. '_' .. segment.endStation .. '_' .. seatType
        local available = tonumber(redis.call('HGET', KEYS[1], field) or '0')
        if available < count then
            table.insert(insufficient, tonumber(entry.seatType))
            break
        end
    end
end
if #insufficient > 0 then
    return cjson.encode({success = false, insufficientSeatTypes = insufficient})
end
for _, entry in ipairs(seatTypeCounts) do
    local seatType = tostring(entry.seatType)
    local count = tonumber(entry.count)
    for _, segment in ipairs(segments) do
        local field = segment.startStation .. '_' .. segment.endStation .. '_' .. seatType
        redis.call('HINCRBY', KEYS[1], field, -count)
    end
end
return cjson.encode({success = true})
"#;

const ROLLBACK_TOKENS_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return -1
end
local seatTypeCounts = cjson.decode(ARGV[1])
local segments = cjson.decode(ARGV[2])
for _, entry in ipairs(seatTypeCounts) do
    local seatType = tostring(entry.seatType)
    local count = tonumber(entry.count)
    for _, segment in ipairs(segments) do
        local field = segment.startStation .. '_' .. segment.endStation .. '_' .. seatType
        redis.call('HINCRBY', KEYS[1], field, count)
    end
end
return 0
"#;

const PUT_MISSING_LUA: &str = r#"
local written = 0
for i = 1, #ARGV, 2 do
    written = written + redis.call('HSETNX', KEYS[1], ARGV[i], ARGV[i + 1])
end
return written
"#;

const RELEASE_LOCK_LUA: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

static TAKE_TOKENS: OnceLock<Script> = OnceLock::new();
static ROLLBACK_TOKENS: OnceLock<Script> = OnceLock::new();
static PUT_MISSING: OnceLock<Script> = OnceLock::new();
static RELEASE_LOCK: OnceLock<Script> = OnceLock::new();

fn bucket_script(script: BucketScript) -> &'static Script {
    match script {
        BucketScript::TakeTokens => TAKE_TOKENS.get_or_init(|| Script::new(TAKE_TOKENS_LUA)),
        BucketScript::RollbackTokens => {
            ROLLBACK_TOKENS.get_or_init(|| Script::new(ROLLBACK_TOKENS_LUA))
        }
    }
}

fn cache_error(err: redis::RedisError) -> CoreError {
    CoreError::CacheError(err.to_string())
}

fn lock_error(err: redis::RedisError) -> CoreError {
    CoreError::LockError(err.to_string())
}

fn reply_from_value(value: Value) -> CoreResult<ScriptReply> {
    match value {
        Value::Nil => Ok(ScriptReply::Nil),
        Value::Int(n) => Ok(ScriptReply::Int(n)),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(ScriptReply::Text)
            .map_err(|e| CoreError::CacheError(format!("Script reply is not UTF-8: {}", e))),
        Value::SimpleString(s) => Ok(ScriptReply::Text(s)),
        Value::Okay => Ok(ScriptReply::Text("OK".to_string())),
        other => Err(CoreError::CacheError(format!(
            "Unexpected script reply: {:?}",
            other
        ))),
    }
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    lock_retry: Duration,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            lock_retry: Duration::from_millis(50),
        })
    }

    /// Poll interval while waiting for a busy lock.
    pub fn with_lock_retry(mut self, interval: Duration) -> Self {
        self.lock_retry = interval;
        self
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl TokenCache for RedisClient {
    async fn exists(&self, key: &str) -> CoreResult<bool> {
        let mut conn = self.connection().await.map_err(cache_error)?;
        conn.exists(key).await.map_err(cache_error)
    }

    async fn hash_put_missing(&self, key: &str, entries: &BTreeMap<String, i64>) -> CoreResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await.map_err(cache_error)?;
        let mut invocation = PUT_MISSING
            .get_or_init(|| Script::new(PUT_MISSING_LUA))
            .prepare_invoke();
        invocation.key(key);
        for (field, value) in entries {
            invocation.arg(field.as_str()).arg(*value);
        }
        let written: i64 = invocation.invoke_async(&mut conn).await.map_err(cache_error)?;
        Ok(written.max(0) as u64)
    }

    async fn hash_get_all(&self, key: &str) -> CoreResult<BTreeMap<String, i64>> {
        let mut conn = self.connection().await.map_err(cache_error)?;
        conn.hgetall(key).await.map_err(cache_error)
    }

    async fn delete(&self, key: &str) -> CoreResult<bool> {
        let mut conn = self.connection().await.map_err(cache_error)?;
        let removed: i64 = conn.del(key).await.map_err(cache_error)?;
        Ok(removed > 0)
    }

    async fn run_atomic(
        &self,
        script: BucketScript,
        keys: &[String],
        args: &[String],
    ) -> CoreResult<ScriptReply> {
        let mut conn = self.connection().await.map_err(cache_error)?;
        let mut invocation = bucket_script(script).prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        let value: Value = invocation.invoke_async(&mut conn).await.map_err(cache_error)?;
        debug!(script = script.name(), "Bucket script executed");
        reply_from_value(value)
    }
}

#[async_trait]
impl DistributedLock for RedisClient {
    async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
        wait: Duration,
    ) -> CoreResult<Option<LockToken>> {
        let mut conn = self.connection().await.map_err(lock_error)?;
        let owner = Uuid::new_v4().to_string();
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX);
        let deadline = Instant::now() + wait;

        loop {
            // SET NX: Only set if key does not exist
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(&owner)
                .arg("NX")
                .arg("PX")
                .arg(lease_ms)
                .query_async(&mut conn)
                .await
                .map_err(lock_error)?;

            if acquired.is_some() {
                debug!(key, "Lock acquired");
                return Ok(Some(LockToken {
                    key: key.to_string(),
                    owner,
                }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.lock_retry).await;
        }
    }

    async fn release(&self, token: LockToken) -> CoreResult<()> {
        let mut conn = self.connection().await.map_err(lock_error)?;
        let removed: i64 = RELEASE_LOCK
            .get_or_init(|| Script::new(RELEASE_LOCK_LUA))
            .key(&token.key)
            .arg(&token.owner)
            .invoke_async(&mut conn)
            .await
            .map_err(lock_error)?;

        if removed == 0 {
            warn!(key = %token.key, "Lock lease expired before release");
        } else {
            info!(key = %token.key, "Lock released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_conversion() {
        assert_eq!(reply_from_value(Value::Nil).unwrap(), ScriptReply::Nil);
        assert_eq!(reply_from_value(Value::Int(-1)).unwrap(), ScriptReply::Int(-1));
        assert_eq!(
            reply_from_value(Value::BulkString(br#"{"success":true}"#.to_vec())).unwrap(),
            ScriptReply::Text(r#"{"success":true}"#.to_string())
        );
        assert!(reply_from_value(Value::Array(vec![])).is_err());
    }

    #[test]
    fn test_scripts_are_memoised() {
        let first = bucket_script(BucketScript::TakeTokens) as *const Script;
        let second = bucket_script(BucketScript::TakeTokens) as *const Script;
        assert_eq!(first, second);
        assert_ne!(
            bucket_script(BucketScript::TakeTokens).get_hash(),
            bucket_script(BucketScript::RollbackTokens).get_hash()
        );
    }
}
