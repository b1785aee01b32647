use serde::{Deserialize, Serialize};

/// The fixed set of chart groups the admin editor offers. Membership is
/// advisory: unknown groups are accepted with a warning so older exports
/// still load.
pub const CHART_GROUPS: [&str; 10] = [
    "Key Metrics",
    "Accounts",
    "AR Aging",
    "Customer Metrics",
    "Daily Orders",
    "Historical Data",
    "Inventory",
    "POR Overview",
    "Site Distribution",
    "Web Orders",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerName {
    #[serde(rename = "P21")]
    P21,
    #[serde(rename = "POR")]
    Por,
}

impl ServerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P21 => "P21",
            Self::Por => "POR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P21" => Some(Self::P21),
            "POR" => Some(Self::Por),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    Connected,
    Error,
    Unknown,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataRow {
    pub id: i64,
    pub chart_group: String,
    pub variable_name: String,
    pub server_name: ServerName,
    pub table_name: String,
    pub sql_expression: String,
    pub production_sql_expression: String,
    pub value: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChartPayload {
    pub id: Option<i64>,
    pub chart_group: String,
    pub variable_name: String,
    pub server_name: ServerName,
    pub table_name: Option<String>,
    pub sql_expression: String,
    pub production_sql_expression: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkChartRow {
    pub id: i64,
    pub chart_group: String,
    pub variable_name: String,
    pub server_name: ServerName,
    pub table_name: Option<String>,
    pub sql_expression: String,
    pub production_sql_expression: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartListFilter {
    pub group: Option<String>,
    pub server: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartGroupSummary {
    pub chart_group: String,
    pub row_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionPayload {
    pub server_name: ServerName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub server_name: ServerName,
    pub message: String,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHocQueryPayload {
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub server_name: ServerName,
    pub value: Option<String>,
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRefreshResult {
    pub id: i64,
    pub variable_name: String,
    pub success: bool,
    pub value: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStats {
    pub attempted: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminVariable {
    pub id: String,
    pub name: String,
    pub value: String,
    pub description: Option<String>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAdminVariablePayload {
    pub id: Option<String>,
    pub name: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub server_name: ServerName,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub file_path: Option<String>,
    pub is_active: bool,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveServerConfigPayload {
    pub server_name: ServerName,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub file_path: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub server_name: ServerName,
    pub status: ConnectionStatus,
    pub message: String,
    pub checked_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: i64,
    pub chart_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_round_trips_wire_literals() {
        assert_eq!(
            serde_json::to_string(&ServerName::P21).ok().as_deref(),
            Some("\"P21\"")
        );
        assert_eq!(
            serde_json::to_string(&ServerName::Por).ok().as_deref(),
            Some("\"POR\"")
        );
        let parsed: ServerName = serde_json::from_str("\"POR\"").expect("parse POR");
        assert_eq!(parsed, ServerName::Por);
    }

    #[test]
    fn server_name_parse_is_case_insensitive() {
        assert_eq!(ServerName::parse("p21"), Some(ServerName::P21));
        assert_eq!(ServerName::parse(" por "), Some(ServerName::Por));
        assert_eq!(ServerName::parse("oracle"), None);
    }

    #[test]
    fn chart_row_serializes_camel_case() {
        let row = ChartDataRow {
            id: 7,
            chart_group: "AR Aging".to_string(),
            variable_name: "Current".to_string(),
            server_name: ServerName::P21,
            table_name: "ar_open_items".to_string(),
            sql_expression: "SELECT 1".to_string(),
            production_sql_expression: "SELECT 1".to_string(),
            value: "0".to_string(),
            last_updated: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&row).expect("serialize row");
        assert!(json.get("chartGroup").is_some());
        assert!(json.get("sqlExpression").is_some());
        assert_eq!(json.get("serverName").and_then(|v| v.as_str()), Some("P21"));
    }
}
