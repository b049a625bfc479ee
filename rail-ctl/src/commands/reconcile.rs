//! Reconcile command - compare a bucket with the seat table.

use anyhow::Result;
use clap::Args;
use rail_inventory::{Reconciliation, TicketInventory};

use super::TrainArgs;
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub train: TrainArgs,

    /// Report drift without invalidating.
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: ReconcileArgs, inventory: &TicketInventory, format: OutputFormat) -> Result<()> {
    let train_id = args.train.train();
    let Reconciliation { drift, invalidated } =
        inventory.lifecycle.reconcile(train_id, args.dry_run).await?;

    match format {
        OutputFormat::Json => {
            let fields: Vec<_> = drift
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "field": d.field,
                        "cached": d.cached,
                        "authoritative": d.authoritative,
                    })
                })
                .collect();
            let body = serde_json::json!({
                "trainId": train_id,
                "drift": fields,
                "invalidated": invalidated,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            if drift.is_empty() {
                println!("Train {train_id}: bucket matches the seat table (or is cold)");
                return Ok(());
            }
            println!("Train {train_id}: {} drifted fields", drift.len());
            for d in &drift {
                println!(
                    "  {:<28} cached {:>6}  seat table {:>6}",
                    d.field,
                    display(d.cached),
                    display(d.authoritative)
                );
            }
            if invalidated {
                println!("Bucket invalidated");
            }
        }
    }
    Ok(())
}

fn display(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
