use super::{timeout_error, Connector, ProbeOutcome, QueryOutcome};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::ServerName;
use crate::redaction::{mask_connection_string, redact_message};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const CONNECT_TIMEOUT_SECONDS: u64 = 8;
const QUERY_TIMEOUT_SECONDS: u64 = 30;

/// SQL Server connector for the P21 ERP database. Each call opens a fresh
/// TDS session; pooling is left to the server side, and there is no retry.
pub struct P21Connector {
    db: Arc<Database>,
    env_dsn: Option<String>,
}

impl P21Connector {
    pub fn new(db: Arc<Database>, env_dsn: Option<String>) -> Self {
        Self { db, env_dsn }
    }

    /// The server_configs row wins when it carries a host; the P21_DSN
    /// ADO-style string is the fallback.
    fn resolve_config(&self) -> AppResult<Config> {
        let stored = self.db.get_server_config(ServerName::P21)?;
        if let Some(stored) = stored.as_ref().filter(|config| config.is_active) {
            if let Some(host) = stored.host.as_deref().filter(|host| !host.trim().is_empty()) {
                let mut config = Config::new();
                config.host(host);
                config.port(stored.port.unwrap_or(1433) as u16);
                if let Some(database) = stored.database.as_deref() {
                    config.database(database);
                }
                match (stored.username.as_deref(), stored.password.as_deref()) {
                    (Some(username), Some(password)) => {
                        config.authentication(AuthMethod::sql_server(username, password));
                    }
                    _ => {
                        return Err(AppError::Connection(
                            "P21 credentials are incomplete; set username and password"
                                .to_string(),
                        ));
                    }
                }
                config.encryption(EncryptionLevel::NotSupported);
                config.trust_cert();
                return Ok(config);
            }
        }

        if let Some(dsn) = self.env_dsn.as_deref() {
            return Config::from_ado_string(dsn).map_err(|err| {
                AppError::Connection(format!(
                    "P21_DSN is not a valid ADO connection string ({}): {}",
                    mask_connection_string(dsn),
                    redact_message(&err.to_string())
                ))
            });
        }

        Err(AppError::Connection(
            "P21 connection is not configured; set P21_DSN or save a server config".to_string(),
        ))
    }

    async fn connect(&self) -> AppResult<Client<Compat<TcpStream>>> {
        let config = self.resolve_config()?;
        let addr = config.get_addr();

        let tcp = timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECONDS),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| timeout_error(ServerName::P21, "connect", CONNECT_TIMEOUT_SECONDS))?
        .map_err(|err| {
            AppError::Connection(redact_message(&format!("{}: {}", addr, err)))
        })?;
        tcp.set_nodelay(true)
            .map_err(|err| AppError::Connection(err.to_string()))?;

        timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECONDS),
            Client::connect(config, tcp.compat_write()),
        )
        .await
        .map_err(|_| timeout_error(ServerName::P21, "login", CONNECT_TIMEOUT_SECONDS))?
        .map_err(|err| AppError::Connection(redact_message(&err.to_string())))
    }
}

#[async_trait]
impl Connector for P21Connector {
    fn server_name(&self) -> ServerName {
        ServerName::P21
    }

    async fn probe(&self) -> AppResult<ProbeOutcome> {
        let started = Instant::now();
        let mut client = self.connect().await?;

        let rows = timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECONDS),
            async { client.simple_query("SELECT 1").await?.into_first_result().await },
        )
        .await
        .map_err(|_| timeout_error(ServerName::P21, "probe query", QUERY_TIMEOUT_SECONDS))?
        .map_err(|err| AppError::Connection(redact_message(&err.to_string())))?;

        if rows.is_empty() {
            return Err(AppError::Connection(
                "P21 probe query returned no rows".to_string(),
            ));
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        Ok(ProbeOutcome {
            message: format!("SQL Server responded to SELECT 1 in {} ms", elapsed_ms),
            elapsed_ms,
        })
    }

    async fn execute(&self, sql: &str) -> AppResult<QueryOutcome> {
        let started = Instant::now();
        let mut client = self.connect().await?;

        let sql = sql.to_string();
        let rows = timeout(Duration::from_secs(QUERY_TIMEOUT_SECONDS), async {
            client.simple_query(&sql).await?.into_first_result().await
        })
        .await
        .map_err(|_| timeout_error(ServerName::P21, "query", QUERY_TIMEOUT_SECONDS))?
        .map_err(|err| AppError::Sql(redact_message(&err.to_string())))?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mut objects = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut object = serde_json::Map::new();
            for (index, column) in row.columns().iter().enumerate() {
                object.insert(column.name().to_string(), cell_to_json(row, index));
            }
            objects.push(serde_json::Value::Object(object));
        }

        Ok(QueryOutcome {
            columns,
            rows: objects,
            elapsed_ms: started.elapsed().as_millis() as i64,
        })
    }
}

/// TDS cells are strictly typed, so conversion is a cascade of exact
/// matches; a NULL of any type falls through to JSON null.
fn cell_to_json(row: &tiberius::Row, index: usize) -> serde_json::Value {
    if let Ok(Some(value)) = row.try_get::<i32, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<i64, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<i16, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<u8, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<f64, _>(index) {
        return serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(Some(value)) = row.try_get::<f32, _>(index) {
        return serde_json::Number::from_f64(value as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(Some(value)) = row.try_get::<tiberius::numeric::Numeric, _>(index) {
        let rendered = value.value() as f64 / 10f64.powi(value.scale() as i32);
        return serde_json::Number::from_f64(rendered)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(Some(value)) = row.try_get::<bool, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<&str, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(Some(value)) = row.try_get::<uuid::Uuid, _>(index) {
        return serde_json::Value::from(value.to_string());
    }
    if let Ok(Some(value)) = row.try_get::<chrono::NaiveDateTime, _>(index) {
        return serde_json::Value::from(value.to_string());
    }
    if let Ok(Some(value)) = row.try_get::<chrono::NaiveDate, _>(index) {
        return serde_json::Value::from(value.to_string());
    }
    if let Ok(Some(value)) = row.try_get::<chrono::NaiveTime, _>(index) {
        return serde_json::Value::from(value.to_string());
    }
    if let Ok(Some(value)) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(index) {
        return serde_json::Value::from(value.to_rfc3339());
    }
    serde_json::Value::Null
}
