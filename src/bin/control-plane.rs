//! Control Plane Daemon
//!
//! Loads configuration, starts the coordinator tick loops and runs until Ctrl-C.
//! Snapshots are logged, or written to PostgreSQL when `BULWARK_SNAPSHOT_DATABASE_URL`
//! is set.

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use bulwark_core::config::ConfigLoader;
use bulwark_core::logging::init_structured_logging;
use bulwark_core::orchestration::{
    ControlPlaneCoordinator, LoggingSnapshotSink, PgSnapshotSink, SnapshotSink,
};

#[derive(Parser)]
#[command(name = "control-plane")]
#[command(about = "Run the Bulwark scalability and resilience control plane")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Load a single configuration file instead of the layered directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to wait for tick loops to finish on shutdown
    #[arg(long, default_value_t = 10)]
    shutdown_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("loading control plane configuration")?;

    let sink: Arc<dyn SnapshotSink> = match std::env::var("BULWARK_SNAPSHOT_DATABASE_URL") {
        Ok(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .connect(&url)
                .await
                .context("connecting snapshot database")?;
            let sink = PgSnapshotSink::new(pool);
            sink.ensure_table().await.context("creating snapshot table")?;
            Arc::new(sink)
        }
        Err(_) => Arc::new(LoggingSnapshotSink),
    };

    let coordinator = ControlPlaneCoordinator::builder(config)
        .with_snapshot_sink(sink)
        .build()
        .context("building control plane coordinator")?;

    coordinator.start()?;
    info!(coordinator_id = %coordinator.id(), "Control plane running, press Ctrl-C to stop");

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    coordinator
        .stop(Duration::from_secs(cli.shutdown_timeout_secs))
        .await?;
    info!("Control plane stopped");
    Ok(())
}
