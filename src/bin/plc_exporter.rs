//! PLC Exporter
//!
//! Polls a PLC over Modbus TCP and serves the values on `/metrics`.
//!
//! Usage: plc-exporter --config plc.yaml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use plc_exporter::{
    logging, server, ExporterConfig, MetricModel, PrometheusSink, Scheduler, TcpConnector,
};

#[derive(Parser, Debug)]
#[command(name = "plc-exporter", version, about = "Modbus TCP PLC exporter for Prometheus")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ExporterConfig::load(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    logging::init(config.server.log_level);
    info!(
        "Starting plc-exporter {} for {} ({} registers)",
        env!("CARGO_PKG_VERSION"),
        config.plc.address(),
        config.registers.len()
    );

    let model = MetricModel::new(&config.runtime);
    let sink = Arc::new(PrometheusSink::new(&model).context("failed to create metrics")?);

    let listener = server::bind(config.server.port)
        .await
        .with_context(|| format!("failed to bind port {}", config.server.port))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http = tokio::spawn(server::serve(listener, Arc::clone(&sink), shutdown_rx.clone()));

    let scheduler = Scheduler::new(&config, TcpConnector::new(config.plc.clone()), sink);
    let polling = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    // Receivers may already be gone if a task failed early.
    let _ = shutdown_tx.send(true);

    if let Err(e) = polling.await {
        error!("Scheduler task failed: {}", e);
    }
    match http.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server failed: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }
    info!("Stopped");
    Ok(())
}
