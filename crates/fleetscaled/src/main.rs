//! fleetscaled — the fleet scaling daemon.
//!
//! # Usage
//!
//! ```text
//! fleetscaled run --config /etc/fleetscale/fleetscale.toml
//! fleetscaled run --once
//! fleetscaled evaluate --snapshot snapshot.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use fleetscale_client::FileSnapshotProvider;
use fleetscale_core::FleetConfig;
use fleetscaled::Daemon;

#[derive(Parser)]
#[command(name = "fleetscaled", about = "Conferencing fleet scaler", version)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the fleet periodically and apply scaling decisions.
    Run {
        /// Path to fleetscale.toml.
        #[arg(long, env = "FLEETSCALE_CONFIG", default_value = "/etc/fleetscale/fleetscale.toml")]
        config: PathBuf,

        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },
    /// Print the decisions for the current snapshot without applying them.
    Evaluate {
        /// Path to fleetscale.toml.
        #[arg(long, env = "FLEETSCALE_CONFIG", default_value = "/etc/fleetscale/fleetscale.toml")]
        config: PathBuf,

        /// Read the snapshot from a JSON file instead of the monitoring API.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::Run { config, once } => run(config, once).await,
        Command::Evaluate { config, snapshot } => evaluate(config, snapshot).await,
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,fleetscale=debug"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<FleetConfig> {
    let config = FleetConfig::from_file(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

async fn run(config_path: PathBuf, once: bool) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;
    let daemon = Daemon::from_config(&config)?;

    if once {
        return daemon.run_once().await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_secs(config.daemon.interval_secs);

    let handle = tokio::spawn(async move {
        daemon.run(interval, shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    info!("fleetscaled stopped");
    Ok(())
}

async fn evaluate(config_path: PathBuf, snapshot: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;
    let mut daemon = Daemon::from_config(&config)?;
    if let Some(path) = snapshot {
        daemon = daemon.with_snapshot_provider(Arc::new(FileSnapshotProvider::new(path)));
    }

    let plan = daemon.plan().await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    if let Some(e) = plan.shutdown_error {
        anyhow::bail!("shutdown evaluation incomplete: {e}");
    }
    Ok(())
}
