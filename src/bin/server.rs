//! Meridian Server - headless trading engine.
//!
//! This binary runs the trading engine without any admin or dashboard
//! surface, suitable for server deployments. Metrics are pushed via
//! structured JSON logs to stdout - no HTTP server, no incoming
//! connections (§1.1 ambient stack, Non-goals).
//!
//! # Environment Variables
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)
//! - `OBSERVABILITY_INTERVAL` - Interval in seconds between metric outputs
//!
//! # Metrics Output
//! Snapshots are printed as JSON to stdout with prefix `METRICS_JSON:`.
//! Example: `METRICS_JSON:{"timestamp":"...","active_trades":3,...}`

use anyhow::Result;
use meridian::application::system::Application;
use meridian::config::Config;
use meridian::infrastructure::observability::MetricsReporter;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("meridian server {} starting...", env!("CARGO_PKG_VERSION"));
    info!("mode: headless (no UI, no HTTP server)");

    let config = Config::from_env()?;
    info!(
        symbols = config.symbols_to_tables.len(),
        strategies = config.strategies.len(),
        "configuration loaded"
    );

    let app = Application::build(config.clone()).await?;
    let metrics = app.metrics.clone();
    let handle = app.start().await?;
    info!("trading engine running");

    if config.observability_enabled {
        let reporter = MetricsReporter::new(
            handle.store.clone(),
            metrics,
            config.observability_interval_seconds,
        );
        tokio::spawn(async move {
            reporter.run().await;
        });
        info!(
            interval_seconds = config.observability_interval_seconds,
            "metrics reporter started"
        );
    } else {
        info!("metrics reporting disabled");
    }

    info!("server running, press ctrl+c to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining tasks...");

    handle.shutdown().await;
    info!("shutdown complete");

    Ok(())
}
