//! # rail-ctl
//!
//! Operator tool for the per-train seat token buckets.
//!
//! ## Commands
//!
//! - `rail-ctl warm <train-id>` - build the bucket if it is cold
//! - `rail-ctl inspect <train-id>` - print the cached bucket
//! - `rail-ctl invalidate <train-id>` - drop the cached bucket
//! - `rail-ctl reconcile <train-id>` - compare with the seat table, drop on drift
//!
//! Connection settings come from `config/` and `RAIL__*` environment
//! variables, see [`rail_store::app_config::Config`].

pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rail_core::route::StationRouteService;
use rail_inventory::{InventoryDeps, InventoryOptions, LockPolicy, TicketInventory};
use rail_store::app_config::Config;
use rail_store::{DbClient, PostgresSeatRepository, RedisClient};
use std::sync::Arc;
use tracing::info;

/// Seat token bucket operator CLI.
#[derive(Debug, Parser)]
#[command(name = "rail-ctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run pending database migrations before the command.
    #[arg(long, global = true)]
    pub migrate: bool,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a train's bucket from the seat table if it is cold.
    Warm(commands::TrainArgs),
    /// Print a train's cached bucket.
    Inspect(commands::TrainArgs),
    /// Drop a train's cached bucket.
    Invalidate(commands::TrainArgs),
    /// Compare a train's bucket with the seat table and drop it on drift.
    Reconcile(commands::reconcile::ReconcileArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Connects to PostgreSQL and Redis and wires the inventory.
pub async fn connect(config: &Config, migrate: bool) -> Result<TicketInventory> {
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if migrate {
        db.migrate().await.context("Failed to run migrations")?;
    }

    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?
        .with_lock_retry(config.bucket.lock_retry());
    let redis = Arc::new(redis);
    let store = Arc::new(PostgresSeatRepository::new(db.pool.clone()));

    let deps = InventoryDeps {
        trains: store.clone(),
        seats: store.clone(),
        routes: Arc::new(StationRouteService::new(store)),
        cache: redis.clone(),
        lock: redis,
    };
    let options = InventoryOptions {
        bucket_key_prefix: config.bucket.key_prefix.clone(),
        lock_key_prefix: config.bucket.lock_key_prefix.clone(),
        lock: LockPolicy {
            lease: config.bucket.lock_lease(),
            wait: config.bucket.lock_wait(),
        },
    };

    info!(redis = %config.redis.url, "Inventory wired");
    Ok(TicketInventory::new(deps, options))
}
