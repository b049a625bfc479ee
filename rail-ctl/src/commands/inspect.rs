//! Inspect command - print a cached bucket.

use anyhow::Result;
use rail_inventory::{BucketEntry, TicketInventory};
use serde::Serialize;

use super::TrainArgs;
use crate::OutputFormat;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryView<'a> {
    start_station: &'a str,
    end_station: &'a str,
    seat_type: u32,
    remaining: i64,
}

impl<'a> From<&'a BucketEntry> for EntryView<'a> {
    fn from(entry: &'a BucketEntry) -> Self {
        Self {
            start_station: &entry.segment.start_station,
            end_station: &entry.segment.end_station,
            seat_type: entry.seat_type.0,
            remaining: entry.remaining,
        }
    }
}

pub async fn execute(args: TrainArgs, inventory: &TicketInventory, format: OutputFormat) -> Result<()> {
    let train_id = args.train();
    let entries = inventory.lifecycle.snapshot(train_id).await?;

    match format {
        OutputFormat::Json => {
            let views: Vec<EntryView<'_>> = entries.iter().map(EntryView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("Train {train_id}: bucket is cold");
                return Ok(());
            }
            println!("Train {train_id}: {} fields", entries.len());
            println!();
            for entry in &entries {
                println!(
                    "  {:<24} seat {:>2}  {:>6}",
                    entry.segment.to_string(),
                    entry.seat_type,
                    entry.remaining
                );
            }
        }
    }
    Ok(())
}
