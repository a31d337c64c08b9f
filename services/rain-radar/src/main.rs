//! Rain radar service.
//!
//! Polls the DWD RV radar composite for one location with:
//! - Conditional requests (ETag) against the latest archive
//! - Decoding of every forecast frame at the location's grid cell
//! - HTTP status API with forecast, rain outlook and metrics

mod config;
mod poller;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use radar_common::RainOutlook;
use radar_fetcher::RadarFetcher;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ServiceConfig;
use poller::Poller;
use server::ServerState;

#[derive(Parser, Debug)]
#[command(name = "rain-radar")]
#[command(about = "Local rain forecast from the DWD radar composite")]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "RADAR_CONFIG")]
    config: Option<PathBuf>,

    /// Latitude of the location in degrees
    #[arg(long, env = "RADAR_LATITUDE", allow_hyphen_values = true)]
    latitude: Option<f64>,

    /// Longitude of the location in degrees
    #[arg(long, env = "RADAR_LONGITUDE", allow_hyphen_values = true)]
    longitude: Option<f64>,

    /// Fetch once, print the outlook and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT")]
    status_port: Option<u16>,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    config.apply_overrides(args.latitude, args.longitude, args.status_port);
    let location = config.validate()?;

    info!(
        latitude = location.latitude,
        longitude = location.longitude,
        grid = %location.grid,
        "Starting rain radar"
    );

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let fetcher = RadarFetcher::new(config.fetcher_config(), location.latitude, location.longitude)
        .context("Failed to create radar fetcher")?;
    let mut poller = Poller::new(fetcher, config.poll_interval(), config.fetch_timeout());

    if args.once {
        info!("Running single fetch");
        poller.poll_once().await?;

        let snapshot = poller.snapshot();
        let snapshot = snapshot.read().await;
        let outlook = RainOutlook::evaluate(&snapshot.forecasts, Utc::now());
        println!("{}", serde_json::to_string_pretty(&outlook)?);
        return Ok(());
    }

    if !args.no_status_server {
        let server_state = Arc::new(ServerState {
            snapshot: poller.snapshot(),
            location,
            prometheus: Some(prometheus),
        });
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, port).await {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(()).ok();
    });

    poller.run_forever(shutdown_rx).await;

    info!("Rain radar stopped");
    Ok(())
}
