use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use pulsewatch_engine::config::Config;
use pulsewatch_engine::monitoring::TickScheduler;
use pulsewatch_engine::MonitorEngine;

/// Run PulseWatch monitors on a fixed tick
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/pulsewatch/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_ref())?;
    info!("{}", config);

    let engine = Arc::new(MonitorEngine::from_config(&config).await?);

    if cli.once {
        let summary = engine.run_tick().await?;
        info!("Single tick finished: {}", summary);
        return Ok(());
    }

    let scheduler = TickScheduler::new(engine, config.engine.tick_interval());
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    Ok(())
}
