use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub bucket: BucketConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BucketConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_lock_key_prefix")]
    pub lock_key_prefix: String,
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
}

fn default_key_prefix() -> String { "ticket_availability_token_bucket:".to_string() }
fn default_lock_key_prefix() -> String { "lock_ticket_availability_token_bucket:".to_string() }
fn default_lock_lease_ms() -> u64 { 30_000 }
fn default_lock_wait_ms() -> u64 { 3_000 }
fn default_lock_retry_ms() -> u64 { 50 }

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            lock_key_prefix: default_lock_key_prefix(),
            lock_lease_ms: default_lock_lease_ms(),
            lock_wait_ms: default_lock_wait_ms(),
            lock_retry_ms: default_lock_retry_ms(),
        }
    }
}

impl BucketConfig {
    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `RAIL_REDIS__URL=redis://cache:6379` sets `redis.url`
            .add_source(config::Environment::with_prefix("RAIL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_bucket_section_defaults() {
        let raw = r#"
            [database]
            url = "postgres://localhost/rail"

            [redis]
            url = "redis://127.0.0.1:6379"
        "#;

        let cfg: Config = config::Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.bucket.key_prefix, "ticket_availability_token_bucket:");
        assert_eq!(cfg.bucket.lock_wait(), Duration::from_secs(3));
    }

    #[test]
    fn test_bucket_section_overrides() {
        let raw = r#"
            [database]
            url = "postgres://localhost/rail"

            [redis]
            url = "redis://127.0.0.1:6379"

            [bucket]
            key_prefix = "tb:"
            lock_wait_ms = 250
        "#;

        let cfg: Config = config::Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.bucket.key_prefix, "tb:");
        assert_eq!(cfg.bucket.lock_wait(), Duration::from_millis(250));
        assert_eq!(cfg.bucket.lock_key_prefix, "lock_ticket_availability_token_bucket:");
    }
}
