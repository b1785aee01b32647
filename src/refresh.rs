use crate::core::DashboardCore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Periodic refresh driver. One sweep re-executes every chart's SQL in
/// sequence; the atomic flag keeps two sweeps from interleaving.
pub struct RefreshWorker {
    core: Arc<DashboardCore>,
    interval_seconds: u64,
    sweep_active: AtomicBool,
}

impl RefreshWorker {
    pub fn new(core: Arc<DashboardCore>, interval_seconds: u64) -> Self {
        Self {
            core,
            interval_seconds,
            sweep_active: AtomicBool::new(false),
        }
    }

    /// Spawns the ticker task. An interval of zero disables periodic
    /// refresh entirely.
    pub fn spawn(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.interval_seconds == 0 {
            tracing::info!("periodic chart refresh disabled (interval is 0)");
            return None;
        }
        tracing::info!(
            interval_seconds = self.interval_seconds,
            "periodic chart refresh enabled"
        );
        Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.interval_seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        }))
    }

    pub async fn sweep_once(&self) {
        if self
            .sweep_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("refresh sweep already running; skipping this tick");
            return;
        }

        let result = self.core.refresh_all_charts().await;
        self.sweep_active.store(false, Ordering::SeqCst);

        match result {
            Ok(stats) => tracing::info!(
                attempted = stats.attempted,
                refreshed = stats.refreshed,
                failed = stats.failed,
                elapsed_ms = stats.elapsed_ms,
                "refresh sweep complete"
            ),
            Err(err) => tracing::error!(error = %err, "refresh sweep aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{Connector, Dispatcher, ProbeOutcome, QueryOutcome};
    use crate::db::Database;
    use crate::errors::{AppError, AppResult};
    use crate::models::ServerName;
    use async_trait::async_trait;

    struct OfflineConnector(ServerName);

    #[async_trait]
    impl Connector for OfflineConnector {
        fn server_name(&self) -> ServerName {
            self.0
        }

        async fn probe(&self) -> AppResult<ProbeOutcome> {
            Err(AppError::Connection("offline".to_string()))
        }

        async fn execute(&self, _sql: &str) -> AppResult<QueryOutcome> {
            Err(AppError::Connection("offline".to_string()))
        }
    }

    fn offline_core(dir: &tempfile::TempDir) -> Arc<DashboardCore> {
        let db = Arc::new(Database::new(&dir.path().join("refresh.db")).expect("db"));
        let dispatcher = Dispatcher::new(
            Arc::new(OfflineConnector(ServerName::P21)),
            Arc::new(OfflineConnector(ServerName::Por)),
        );
        Arc::new(DashboardCore::new(db, dispatcher))
    }

    #[tokio::test]
    async fn zero_interval_disables_the_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let worker = Arc::new(RefreshWorker::new(offline_core(&dir), 0));
        assert!(worker.spawn().is_none());
    }

    #[tokio::test]
    async fn sweep_releases_the_overlap_guard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let worker = RefreshWorker::new(offline_core(&dir), 3600);

        worker.sweep_once().await;
        assert!(!worker.sweep_active.load(Ordering::SeqCst));

        // A second sweep must start normally after the first released it.
        worker.sweep_once().await;
        assert!(!worker.sweep_active.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn held_guard_skips_the_sweep() {
        let dir = tempfile::tempdir().expect("tempdir");
        let worker = RefreshWorker::new(offline_core(&dir), 3600);

        worker.sweep_active.store(true, Ordering::SeqCst);
        worker.sweep_once().await;
        assert!(worker.sweep_active.load(Ordering::SeqCst));
    }
}
