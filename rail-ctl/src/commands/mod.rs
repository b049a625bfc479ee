//! Subcommand implementations.

pub mod inspect;
pub mod invalidate;
pub mod reconcile;
pub mod warm;

use clap::Args;
use rail_core::TrainId;

/// Selects one train.
#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Train ID.
    #[arg()]
    pub train_id: i64,
}

impl TrainArgs {
    pub fn train(&self) -> TrainId {
        TrainId(self.train_id)
    }
}
