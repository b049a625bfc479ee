//! Warm command - build a cold bucket.

use anyhow::Result;
use rail_inventory::{TicketInventory, Warmup};
use serde_json::json;

use super::TrainArgs;
use crate::OutputFormat;

pub async fn execute(args: TrainArgs, inventory: &TicketInventory, format: OutputFormat) -> Result<()> {
    let train_id = args.train();
    let warmup = inventory.ensure_warm(train_id).await?;

    match format {
        OutputFormat::Json => {
            let body = match warmup {
                Warmup::Remembered | Warmup::AlreadyWarm => json!({ "trainId": train_id, "built": false }),
                Warmup::Built { fields } => json!({ "trainId": train_id, "built": true, "fields": fields }),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => match warmup {
            Warmup::Remembered | Warmup::AlreadyWarm => println!("Train {train_id}: bucket already warm"),
            Warmup::Built { fields } => println!("Train {train_id}: bucket built with {fields} fields"),
        },
    }
    Ok(())
}
