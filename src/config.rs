use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DB_FILE: &str = "dashboard.db";
pub const DEFAULT_POR_READER_BIN: &str = "mdb-sql";
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 3600;

/// Runtime configuration, read once from the environment at startup.
/// Connection settings resolved here act as fallbacks; rows in the
/// server_configs table take precedence.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub p21_dsn: Option<String>,
    pub por_file_path: Option<String>,
    pub por_reader_bin: String,
    pub refresh_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("DASHBOARD_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
        );
        let db_path = std::env::var("DASHBOARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join(DEFAULT_DB_FILE));
        let bind_addr =
            std::env::var("DASHBOARD_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let refresh_interval_seconds = std::env::var("REFRESH_INTERVAL_SECONDS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECONDS);

        Self {
            data_dir,
            db_path,
            bind_addr,
            p21_dsn: non_empty_env("P21_DSN"),
            por_file_path: non_empty_env("POR_FILE_PATH"),
            por_reader_bin: std::env::var("POR_MDB_SQL_BIN")
                .unwrap_or_else(|_| DEFAULT_POR_READER_BIN.to_string()),
            refresh_interval_seconds,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn defaults_apply_without_environment() {
        // Build from a snapshot that deliberately ignores the process env
        // to keep the test hermetic.
        let config = AppConfig {
            data_dir: super::DEFAULT_DATA_DIR.into(),
            db_path: std::path::Path::new(super::DEFAULT_DATA_DIR).join(super::DEFAULT_DB_FILE),
            bind_addr: super::DEFAULT_BIND.to_string(),
            p21_dsn: None,
            por_file_path: None,
            por_reader_bin: super::DEFAULT_POR_READER_BIN.to_string(),
            refresh_interval_seconds: super::DEFAULT_REFRESH_INTERVAL_SECONDS,
        };
        assert_eq!(config.db_path.to_string_lossy(), "data/dashboard.db");
        assert_eq!(config.log_dir().to_string_lossy(), "data/logs");
    }
}
