pub mod config;
pub mod connectors;
pub mod core;
pub mod db;
pub mod errors;
pub mod http;
pub mod models;
pub mod policy;
pub mod redaction;
pub mod refresh;

use crate::config::AppConfig;
use crate::connectors::{Dispatcher, P21Connector, PorConnector};
use crate::core::DashboardCore;
use crate::db::Database;
use crate::refresh::RefreshWorker;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(&config.log_dir()).map_err(|error| anyhow::anyhow!(error))?;

    tracing::info!(
        db_path = %config.db_path.display(),
        bind = %config.bind_addr,
        "dashboard server starting"
    );

    let db = Arc::new(Database::new(&config.db_path).context("open dashboard database")?);

    let p21 = Arc::new(P21Connector::new(Arc::clone(&db), config.p21_dsn.clone()));
    let por = Arc::new(PorConnector::new(
        Arc::clone(&db),
        config.por_file_path.clone(),
        config.por_reader_bin.clone(),
    ));
    let core = Arc::new(DashboardCore::new(
        Arc::clone(&db),
        Dispatcher::new(p21, por),
    ));

    let worker = Arc::new(RefreshWorker::new(
        Arc::clone(&core),
        config.refresh_interval_seconds,
    ));
    worker.spawn();

    let app = http::router(core);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await.context("serve http")?;
    Ok(())
}

fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "dashboard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
