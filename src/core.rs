use crate::connectors::{Dispatcher, QueryOutcome};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AdminVariable, BulkChartRow, ChartDataRow, ChartGroupSummary, ChartListFilter,
    ChartRefreshResult, ConnectionStatus, ConnectionTestResponse, HealthResponse, QueryResponse,
    SaveAdminVariablePayload, SaveChartPayload, SaveServerConfigPayload, ServerConfig,
    ServerHealth, ServerName, SweepStats,
};
use crate::policy::QueryPolicy;
use crate::redaction::redact_message;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Placeholder the API substitutes for stored passwords. A payload that
/// echoes it back leaves the stored password untouched.
pub const MASKED_PASSWORD: &str = "********";

/// Shared application state behind every HTTP handler and the refresh
/// worker. Holds the SQLite handle, the P21/POR dispatch, the SQL
/// gatekeeper, and the in-memory connection health registry.
pub struct DashboardCore {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    policy: QueryPolicy,
    health: RwLock<HashMap<ServerName, ServerHealth>>,
    started_at: Instant,
}

impl DashboardCore {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        let mut health = HashMap::new();
        for server in [ServerName::P21, ServerName::Por] {
            health.insert(
                server,
                ServerHealth {
                    server_name: server,
                    status: ConnectionStatus::Unknown,
                    message: "no connection attempt yet".to_string(),
                    checked_at: None,
                },
            );
        }
        Self {
            db,
            dispatcher,
            policy: QueryPolicy::new(),
            health: RwLock::new(health),
            started_at: Instant::now(),
        }
    }

    pub fn list_charts(&self, filter: &ChartListFilter) -> AppResult<Vec<ChartDataRow>> {
        let server = match filter.server.as_deref() {
            Some(raw) => Some(ServerName::parse(raw).ok_or_else(|| {
                AppError::Validation(format!("unknown server name '{}'", raw))
            })?),
            None => None,
        };
        self.db.list_charts(filter.group.as_deref(), server)
    }

    pub fn get_chart(&self, id: i64) -> AppResult<ChartDataRow> {
        self.db
            .get_chart(id)?
            .ok_or_else(|| AppError::NotFound(format!("chart {} not found", id)))
    }

    pub fn save_chart(&self, payload: &SaveChartPayload) -> AppResult<ChartDataRow> {
        self.policy.validate_chart_payload(payload)?;
        let saved = self.db.save_chart(payload)?;
        tracing::info!(
            chart_id = saved.id,
            group = %saved.chart_group,
            variable = %saved.variable_name,
            "chart saved"
        );
        Ok(saved)
    }

    pub fn delete_chart(&self, id: i64) -> AppResult<()> {
        if self.db.delete_chart(id)? {
            tracing::info!(chart_id = id, "chart deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("chart {} not found", id)))
        }
    }

    /// Atomic wipe-and-reload of the whole chart table. Validation runs
    /// over the entire array before a single row is touched.
    pub fn replace_all_charts(&self, rows: &[BulkChartRow]) -> AppResult<usize> {
        self.policy.validate_bulk_rows(rows)?;
        let inserted = self.db.replace_all_charts(rows)?;
        tracing::info!(rows = inserted, "chart table replaced via bulk load");
        Ok(inserted)
    }

    pub fn chart_groups(&self) -> AppResult<Vec<ChartGroupSummary>> {
        self.db.list_chart_groups()
    }

    /// Executes the chart's stored SQL against its server and caches the
    /// scalar result in the `value` column.
    pub async fn refresh_chart(&self, id: i64) -> AppResult<ChartRefreshResult> {
        let chart = self.get_chart(id)?;
        self.policy.validate_sql(&chart.sql_expression)?;
        let outcome = self
            .run_on(chart.server_name, &chart.sql_expression)
            .await?;
        let value = outcome.scalar();
        self.db.update_chart_value(chart.id, &value)?;
        tracing::debug!(
            chart_id = chart.id,
            variable = %chart.variable_name,
            value = %value,
            elapsed_ms = outcome.elapsed_ms,
            "chart value refreshed"
        );
        Ok(ChartRefreshResult {
            id: chart.id,
            variable_name: chart.variable_name,
            success: true,
            value: Some(value),
            message: None,
        })
    }

    /// One sequential sweep over every chart row. Per-chart failures are
    /// tallied and logged, never fatal to the sweep.
    pub async fn refresh_all_charts(&self) -> AppResult<SweepStats> {
        let charts = self.db.list_charts(None, None)?;
        let started = Instant::now();
        let mut stats = SweepStats {
            attempted: charts.len(),
            ..Default::default()
        };
        for chart in charts {
            match self.refresh_chart(chart.id).await {
                Ok(_) => stats.refreshed += 1,
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(
                        chart_id = chart.id,
                        variable = %chart.variable_name,
                        error = %err,
                        "chart refresh failed"
                    );
                }
            }
        }
        stats.elapsed_ms = started.elapsed().as_millis() as i64;
        Ok(stats)
    }

    /// Ad hoc query proxy for the admin page. The gatekeeper runs before
    /// any connection is opened.
    pub async fn execute_ad_hoc(&self, server: ServerName, sql: &str) -> AppResult<QueryResponse> {
        self.policy.validate_sql(sql)?;
        let outcome = self.run_on(server, sql).await?;
        let value = outcome.scalar();
        let row_count = outcome.rows.len();
        Ok(QueryResponse {
            success: true,
            server_name: server,
            value: Some(value),
            rows: outcome.rows,
            row_count,
            elapsed_ms: outcome.elapsed_ms,
        })
    }

    /// Probes the named server and reports the outcome as data rather
    /// than an error, so the admin page can render both cases.
    pub async fn test_connection(&self, server: ServerName) -> ConnectionTestResponse {
        let started = Instant::now();
        match self.dispatcher.probe(server).await {
            Ok(outcome) => {
                self.record_health(server, ConnectionStatus::Connected, &outcome.message);
                ConnectionTestResponse {
                    success: true,
                    server_name: server,
                    message: outcome.message,
                    elapsed_ms: outcome.elapsed_ms,
                }
            }
            Err(err) => {
                let message = redact_message(&err.to_string());
                self.record_health(server, ConnectionStatus::Error, &message);
                tracing::warn!(server = server.as_str(), error = %message, "connection test failed");
                ConnectionTestResponse {
                    success: false,
                    server_name: server,
                    message,
                    elapsed_ms: started.elapsed().as_millis() as i64,
                }
            }
        }
    }

    pub fn connection_health(&self) -> AppResult<Vec<ServerHealth>> {
        let registry = self
            .health
            .read()
            .map_err(|_| AppError::Internal("health registry lock poisoned".to_string()))?;
        Ok([ServerName::P21, ServerName::Por]
            .iter()
            .filter_map(|server| registry.get(server).cloned())
            .collect())
    }

    pub fn list_admin_variables(&self) -> AppResult<Vec<AdminVariable>> {
        self.db.list_admin_variables()
    }

    pub fn save_admin_variable(
        &self,
        payload: &SaveAdminVariablePayload,
    ) -> AppResult<AdminVariable> {
        if payload.name.trim().is_empty() {
            return Err(AppError::Validation(
                "variable name must not be blank".to_string(),
            ));
        }
        self.db.save_admin_variable(payload)
    }

    pub fn delete_admin_variable(&self, id: &str) -> AppResult<()> {
        if self.db.delete_admin_variable(id)? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "admin variable {} not found",
                id
            )))
        }
    }

    pub fn list_server_configs(&self) -> AppResult<Vec<ServerConfig>> {
        Ok(self
            .db
            .list_server_configs()?
            .into_iter()
            .map(mask_config)
            .collect())
    }

    pub fn save_server_config(
        &self,
        payload: &SaveServerConfigPayload,
    ) -> AppResult<ServerConfig> {
        let mut payload = payload.clone();
        if payload.password.as_deref() == Some(MASKED_PASSWORD) {
            payload.password = None;
        }
        let saved = self.db.upsert_server_config(&payload)?;
        tracing::info!(server = saved.server_name.as_str(), "server config saved");
        Ok(mask_config(saved))
    }

    pub fn health(&self) -> AppResult<HealthResponse> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs() as i64,
            chart_count: self.db.count_charts()?,
        })
    }

    async fn run_on(&self, server: ServerName, sql: &str) -> AppResult<QueryOutcome> {
        match self.dispatcher.execute(server, sql).await {
            Ok(outcome) => {
                self.record_health(
                    server,
                    ConnectionStatus::Connected,
                    &format!("query completed in {} ms", outcome.elapsed_ms),
                );
                Ok(outcome)
            }
            Err(err) => {
                // A Sql failure still reached the server; only transport
                // failures flip health to error.
                if matches!(err, AppError::Connection(_)) {
                    self.record_health(server, ConnectionStatus::Error, &err.to_string());
                }
                Err(err)
            }
        }
    }

    fn record_health(&self, server: ServerName, status: ConnectionStatus, message: &str) {
        match self.health.write() {
            Ok(mut registry) => {
                registry.insert(
                    server,
                    ServerHealth {
                        server_name: server,
                        status,
                        message: redact_message(message),
                        checked_at: Some(Utc::now().to_rfc3339()),
                    },
                );
            }
            Err(_) => tracing::warn!(
                server = server.as_str(),
                "health registry lock poisoned; dropping status update"
            ),
        }
    }
}

fn mask_config(mut config: ServerConfig) -> ServerConfig {
    if config.password.is_some() {
        config.password = Some(MASKED_PASSWORD.to_string());
    }
    config
}
