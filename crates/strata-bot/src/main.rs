//! strata - execution scheduler paper runner.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

/// Run the execution scheduler against a simulated venue.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via STRATA_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log filter.
    let config_path = strata_bot::AppConfig::resolve_path(args.config);
    let (config, found) = strata_bot::AppConfig::load(&config_path)?;

    strata_telemetry::init_logging(&config.telemetry.log_filter)?;

    info!("Starting strata v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Config file not found, using defaults");
    }

    let app = strata_bot::Application::new(config)?;
    let stats = app.run(args.ticks).await?;

    info!(
        inflight = stats.inflight,
        pending = stats.pending_requests,
        "Stopped"
    );
    Ok(())
}
