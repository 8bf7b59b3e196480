#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;
use pulsewatch_engine::MonitorEngine;
use pulsewatch_engine::config::Config;
use pulsewatch_engine::monitoring::TickScheduler;

/// HTTP surface for the PulseWatch engine
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/pulsewatch/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also run the tick scheduler in this process
    #[arg(long)]
    scheduler: bool,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_ref())?;
    let bind = env::var("BIND").unwrap_or_else(|_| config.server.bind.clone());
    let port = env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    let engine = Arc::new(MonitorEngine::from_config(&config).await?);

    if cli.scheduler {
        let scheduler = TickScheduler::new(engine.clone(), config.engine.tick_interval());
        actix_web::rt::spawn(async move { scheduler.run_until(std::future::pending()).await });
        info!("Tick scheduler running every {}s", config.engine.tick_interval_seconds);
    }

    run_server(addr, web::Data::from(engine)).await
}

async fn run_server(addr: SocketAddr, engine: web::Data<MonitorEngine>) -> Result<(), AppError> {
    info!("Listening on {}", addr);
    HttpServer::new(move || App::new().app_data(engine.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
