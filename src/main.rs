// Snapshot Station - Daemon
// Runs the sensor poller and the query API in one process

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snapshot_station::{api, Poller, QueryService, SnapshotStore};

/// Cadence of the fetch → classify → persist cycle.
const POLL_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Config {
    sensor_url: String,
    db_path: PathBuf,
    bind_addr: String,
}

impl Config {
    fn from_env() -> Self {
        Config {
            sensor_url: env::var("SENSOR_URL")
                .unwrap_or_else(|_| "http://localhost:28462/".to_string()),
            db_path: env::var("SNAPSHOT_DB")
                .unwrap_or_else(|_| "snapshots.db".to_string())
                .into(),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!(
        version = snapshot_station::VERSION,
        sensor_url = %config.sensor_url,
        db = %config.db_path.display(),
        "starting snapshot station"
    );

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    let store = SnapshotStore::new(conn).context("failed to initialize snapshot store")?;

    // Poller and query handlers share only the store
    let poller = Poller::new(&config.sensor_url, store.clone())
        .context("failed to build sensor poller")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = tokio::spawn(poller.run(POLL_PERIOD, shutdown_rx));

    let app = api::router(QueryService::new(store));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "query API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop the poller once the server has drained
    let _ = shutdown_tx.send(true);
    poller_task.await.context("poller task panicked")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
