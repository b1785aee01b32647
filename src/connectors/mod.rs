pub mod p21;
pub mod por;

use crate::errors::{AppError, AppResult};
use crate::models::ServerName;
use async_trait::async_trait;
use std::sync::Arc;

pub use p21::P21Connector;
pub use por::PorConnector;

/// Result of executing a stored SQL expression against an external source.
/// Column order is preserved so scalar extraction can fall back to the
/// first column.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub elapsed_ms: i64,
}

impl QueryOutcome {
    /// The dashboard caches one scalar per chart: the `value` column of the
    /// first row when present, else the first column of the first row, else
    /// `"0"`.
    pub fn scalar(&self) -> String {
        let first = match self.rows.first().and_then(|row| row.as_object()) {
            Some(row) => row,
            None => return "0".to_string(),
        };

        let cell = self
            .columns
            .iter()
            .find(|name| name.eq_ignore_ascii_case("value"))
            .or_else(|| self.columns.first())
            .and_then(|name| first.get(name));

        match cell {
            Some(value) => render_scalar(value),
            None => "0".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub message: String,
    pub elapsed_ms: i64,
}

/// One implementation per external source. Every call resolves the current
/// connection settings, so admin edits take effect without a restart.
#[async_trait]
pub trait Connector: Send + Sync {
    fn server_name(&self) -> ServerName;

    /// Cheap connectivity check for the admin page.
    async fn probe(&self) -> AppResult<ProbeOutcome>;

    /// Executes one read-only statement, already passed through the
    /// gatekeeper.
    async fn execute(&self, sql: &str) -> AppResult<QueryOutcome>;
}

#[derive(Clone)]
pub struct Dispatcher {
    p21: Arc<dyn Connector>,
    por: Arc<dyn Connector>,
}

impl Dispatcher {
    pub fn new(p21: Arc<dyn Connector>, por: Arc<dyn Connector>) -> Self {
        Self { p21, por }
    }

    pub fn connector(&self, server: ServerName) -> Arc<dyn Connector> {
        match server {
            ServerName::P21 => Arc::clone(&self.p21),
            ServerName::Por => Arc::clone(&self.por),
        }
    }

    pub async fn execute(&self, server: ServerName, sql: &str) -> AppResult<QueryOutcome> {
        self.connector(server).execute(sql).await
    }

    pub async fn probe(&self, server: ServerName) -> AppResult<ProbeOutcome> {
        self.connector(server).probe().await
    }
}

pub(crate) fn render_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "0".to_string(),
        serde_json::Value::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn timeout_error(server: ServerName, what: &str, seconds: u64) -> AppError {
    AppError::Connection(format!(
        "{} {} timed out after {}s",
        server.as_str(),
        what,
        seconds
    ))
}
