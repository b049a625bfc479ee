use anyhow::{Context, Result};
use clap::Parser;
use rail_ctl::{commands, connect, Cli, Commands};
use rail_store::app_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rail_ctl=info,rail_inventory=info,rail_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;
    let inventory = connect(&config, cli.migrate).await?;

    match cli.command {
        Commands::Warm(args) => commands::warm::execute(args, &inventory, cli.format).await,
        Commands::Inspect(args) => commands::inspect::execute(args, &inventory, cli.format).await,
        Commands::Invalidate(args) => commands::invalidate::execute(args, &inventory).await,
        Commands::Reconcile(args) => commands::reconcile::execute(args, &inventory, cli.format).await,
    }
}
