//! Feature tile service.
//!
//! HTTP server rendering PNG tiles from vector feature layers and serving
//! the features themselves as GeoJSON.

use anyhow::Result;
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wfs_api::config::Args;
use wfs_api::create_router;
use wfs_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()?;

    info!("Prometheus metrics exporter initialized");
    info!("Starting feature tile server");

    // Initialize application state
    let state = AppState::from_args(&args).await?.with_prometheus(prometheus_handle);
    info!(layers = state.layers.len(), "Application state ready");

    let app = create_router(Arc::new(state));

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
