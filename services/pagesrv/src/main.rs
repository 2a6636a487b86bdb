//! Paging Service (pagesrv)
//!
//! Ingests alarm/paging notifications over serial, serial-over-IP, and TAP
//! transports, persists them to SQLite, and notifies the registered
//! subscriber.

use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagesrv::core::sink::{AlarmNotifier, AlarmRecord, AlarmSink};
use pagesrv::core::supervisor::HandlerSupervisor;
use pagesrv::error::{PageSrvError, Result};
use pagesrv::storage::{SettingsStore, SqliteStore};

/// Command-line arguments for pagesrv
#[derive(Parser, Clone)]
#[command(
    name = "pagesrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Alarm paging ingestion service",
    long_about = None
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Path to the SQLite database holding settings and alarms
    #[arg(long, env = "PAGESRV_DB", default_value = "data/pagesrv.db")]
    db_path: String,
}

/// Default subscriber: logs each record as JSON. This is the seam where
/// the external push layer plugs in via `AlarmSink::set_notifier`.
struct LogNotifier;

#[async_trait]
impl AlarmNotifier for LogNotifier {
    async fn notify(&self, record: &AlarmRecord) -> Result<()> {
        let payload =
            serde_json::to_string(record).map_err(|e| PageSrvError::data(e.to_string()))?;
        info!(alarm = %payload, "Alarm ready for subscribers");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Starting pagesrv...");

    let store = Arc::new(SqliteStore::connect(&args.db_path).await?);

    let sink = Arc::new(AlarmSink::new(store.clone()));
    sink.set_notifier(Arc::new(LogNotifier)).await;

    let settings: Arc<dyn SettingsStore> = store;
    let mut supervisor = HandlerSupervisor::new(settings, sink);
    supervisor.start().await;
    info!(status = ?supervisor.status(), "Handler startup complete");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping handlers...");
    supervisor.stop().await;

    info!("pagesrv stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
