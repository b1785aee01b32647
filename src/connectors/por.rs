use super::{timeout_error, Connector, ProbeOutcome, QueryOutcome};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::ServerName;
use crate::redaction::redact_message;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

const QUERY_TIMEOUT_SECONDS: u64 = 30;
const VERSION_PROBE_TIMEOUT_SECONDS: u64 = 3;
const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

static SEMVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?)").expect("valid regex"));

/// MS Access connector for the POR rental database. Queries run through the
/// mdbtools `mdb-sql` CLI as a child process, one invocation per query.
pub struct PorConnector {
    db: Arc<Database>,
    env_file_path: Option<PathBuf>,
    reader_bin: String,
}

impl PorConnector {
    pub fn new(db: Arc<Database>, env_file_path: Option<String>, reader_bin: String) -> Self {
        Self {
            db,
            env_file_path: env_file_path.map(PathBuf::from),
            reader_bin,
        }
    }

    /// The server_configs row wins when it carries a file path; the
    /// POR_FILE_PATH environment variable is the fallback.
    fn resolve_file(&self) -> AppResult<PathBuf> {
        let stored = self.db.get_server_config(ServerName::Por)?;
        let from_row = stored
            .as_ref()
            .filter(|config| config.is_active)
            .and_then(|config| config.file_path.as_deref())
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let path = from_row
            .or_else(|| self.env_file_path.clone())
            .ok_or_else(|| {
                AppError::Connection(
                    "POR file path is not configured; set POR_FILE_PATH or save a server config"
                        .to_string(),
                )
            })?;
        if !path.is_file() {
            return Err(AppError::Connection(format!(
                "POR database file not found at {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Tab-delimited output with the header row kept and the row-count
    /// footer suppressed. The SQL itself arrives on stdin.
    fn build_command(&self, file: &Path) -> (String, Vec<String>) {
        let args = vec![
            "-F".to_string(),
            "-d".to_string(),
            "\t".to_string(),
            file.display().to_string(),
        ];
        (self.reader_bin.clone(), args)
    }

    async fn detect_reader_version(&self) -> AppResult<Option<String>> {
        let child = Command::new(&self.reader_bin)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| spawn_error(&self.reader_bin, err))?;

        let output = timeout(
            Duration::from_secs(VERSION_PROBE_TIMEOUT_SECONDS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| timeout_error(ServerName::Por, "version probe", VERSION_PROBE_TIMEOUT_SECONDS))?
        .map_err(AppError::from)?;

        let combined = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(extract_semver(&combined))
    }

    async fn run_query(&self, file: &Path, sql: &str) -> AppResult<Vec<u8>> {
        let (program, args) = self.build_command(file);
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| spawn_error(&program, err))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = format!("{}\n", sql.trim());
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(AppError::from)?;
        }

        let output = timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECONDS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| timeout_error(ServerName::Por, "query", QUERY_TIMEOUT_SECONDS))?
        .map_err(AppError::from)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(AppError::Sql(redact_message(&format!(
                "POR query failed: {}",
                detail
            ))));
        }

        if output.stdout.len() > MAX_OUTPUT_BYTES {
            return Err(AppError::Sql(format!(
                "POR query output exceeded {} bytes; narrow the query",
                MAX_OUTPUT_BYTES
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Connector for PorConnector {
    fn server_name(&self) -> ServerName {
        ServerName::Por
    }

    async fn probe(&self) -> AppResult<ProbeOutcome> {
        let started = Instant::now();
        let file = self.resolve_file()?;
        let size = std::fs::metadata(&file).map_err(AppError::from)?.len();
        let version = self.detect_reader_version().await?;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        let message = match version {
            Some(version) => format!(
                "mdbtools {} ready; POR file is {} bytes",
                version, size
            ),
            None => format!("POR reader ready; file is {} bytes", size),
        };
        Ok(ProbeOutcome {
            message,
            elapsed_ms,
        })
    }

    async fn execute(&self, sql: &str) -> AppResult<QueryOutcome> {
        let started = Instant::now();
        let file = self.resolve_file()?;
        let stdout = self.run_query(&file, sql).await?;
        let (columns, rows) = parse_delimited_output(&stdout);
        Ok(QueryOutcome {
            columns,
            rows,
            elapsed_ms: started.elapsed().as_millis() as i64,
        })
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> AppError {
    if err.kind() == ErrorKind::NotFound {
        AppError::Connection(format!(
            "POR reader '{}' is not installed or not on PATH",
            program
        ))
    } else {
        AppError::Connection(format!("failed to launch POR reader '{}': {}", program, err))
    }
}

fn extract_semver(text: &str) -> Option<String> {
    SEMVER_RE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// First non-empty line is the header; every later non-empty line is a row.
fn parse_delimited_output(stdout: &[u8]) -> (Vec<String>, Vec<serde_json::Value>) {
    let text = String::from_utf8_lossy(stdout);
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let columns: Vec<String> = match lines.next() {
        Some(header) => header.split('\t').map(|cell| cell.trim().to_string()).collect(),
        None => return (Vec::new(), Vec::new()),
    };

    let mut rows = Vec::new();
    for line in lines {
        let mut object = serde_json::Map::new();
        let mut cells = line.split('\t');
        for column in &columns {
            let cell = cells.next().unwrap_or("");
            object.insert(column.clone(), coerce_cell(cell));
        }
        rows.push(serde_json::Value::Object(object));
    }
    (columns, rows)
}

fn coerce_cell(cell: &str) -> serde_json::Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return serde_json::Value::from(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::from(trimmed));
    }
    serde_json::Value::from(trimmed)
}
