//! Invalidate command - drop a cached bucket.

use anyhow::Result;
use rail_inventory::TicketInventory;

use super::TrainArgs;

pub async fn execute(args: TrainArgs, inventory: &TicketInventory) -> Result<()> {
    let train_id = args.train();
    inventory.invalidate(train_id).await?;
    println!("Train {train_id}: bucket invalidated, next reservation rebuilds it");
    Ok(())
}
