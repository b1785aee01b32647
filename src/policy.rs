use crate::errors::{AppError, AppResult};
use crate::models::{BulkChartRow, SaveChartPayload, CHART_GROUPS};
use std::collections::BTreeSet;

const MAX_SQL_BYTES: usize = 64 * 1024;
const MAX_VARIABLE_NAME_LENGTH: usize = 120;
const MAX_GROUP_NAME_LENGTH: usize = 60;
const MAX_TABLE_NAME_LENGTH: usize = 120;

/// Keywords that disqualify a SQL expression. Matching is plain substring
/// search on the upper-cased text, not SQL parsing: this is a lint against
/// accidental writes, not a security boundary.
const DENIED_KEYWORDS: [&str; 8] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "TRUNCATE", "EXEC",
];

#[derive(Debug, Clone)]
pub struct QueryPolicy {
    denied_keywords: Vec<&'static str>,
    known_groups: BTreeSet<&'static str>,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPolicy {
    pub fn new() -> Self {
        Self {
            denied_keywords: DENIED_KEYWORDS.to_vec(),
            known_groups: CHART_GROUPS.iter().copied().collect(),
        }
    }

    /// Accepts only a single read-only SELECT statement.
    pub fn validate_sql(&self, sql: &str) -> AppResult<()> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("SQL expression is empty".to_string()));
        }
        if trimmed.len() > MAX_SQL_BYTES {
            return Err(AppError::Validation(format!(
                "SQL expression exceeds {} bytes",
                MAX_SQL_BYTES
            )));
        }

        let upper = trimmed.to_uppercase();
        if !upper.starts_with("SELECT") {
            return Err(AppError::Validation(
                "Only SELECT statements are allowed".to_string(),
            ));
        }
        if upper.contains(';') {
            return Err(AppError::Validation(
                "Semicolons are not allowed in chart SQL".to_string(),
            ));
        }
        for keyword in &self.denied_keywords {
            if upper.contains(keyword) {
                return Err(AppError::Validation(format!(
                    "SQL expression contains denied keyword '{}'",
                    keyword
                )));
            }
        }

        Ok(())
    }

    pub fn validate_chart_payload(&self, payload: &SaveChartPayload) -> AppResult<()> {
        self.validate_names(
            &payload.chart_group,
            &payload.variable_name,
            payload.table_name.as_deref(),
        )?;
        self.validate_sql(&payload.sql_expression)?;
        if let Some(production_sql) = payload
            .production_sql_expression
            .as_deref()
            .filter(|sql| !sql.trim().is_empty())
        {
            self.validate_sql(production_sql)?;
        }
        Ok(())
    }

    pub fn validate_bulk_rows(&self, rows: &[BulkChartRow]) -> AppResult<()> {
        let mut seen_ids = BTreeSet::new();
        for row in rows {
            if !seen_ids.insert(row.id) {
                return Err(AppError::Validation(format!(
                    "Duplicate chart id {} in bulk payload",
                    row.id
                )));
            }
            self.validate_names(
                &row.chart_group,
                &row.variable_name,
                row.table_name.as_deref(),
            )?;
            self.validate_sql(&row.sql_expression)?;
            if let Some(production_sql) = row
                .production_sql_expression
                .as_deref()
                .filter(|sql| !sql.trim().is_empty())
            {
                self.validate_sql(production_sql)?;
            }
        }
        Ok(())
    }

    fn validate_names(
        &self,
        chart_group: &str,
        variable_name: &str,
        table_name: Option<&str>,
    ) -> AppResult<()> {
        let group = chart_group.trim();
        if group.is_empty() {
            return Err(AppError::Validation("Chart group is empty".to_string()));
        }
        if group.len() > MAX_GROUP_NAME_LENGTH {
            return Err(AppError::Validation(format!(
                "Chart group exceeds {} characters",
                MAX_GROUP_NAME_LENGTH
            )));
        }
        if !self.known_groups.contains(group) {
            tracing::warn!(chart_group = %group, "chart group is outside the known set");
        }

        let name = variable_name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Variable name is empty".to_string()));
        }
        if name.len() > MAX_VARIABLE_NAME_LENGTH {
            return Err(AppError::Validation(format!(
                "Variable name exceeds {} characters",
                MAX_VARIABLE_NAME_LENGTH
            )));
        }

        if let Some(table) = table_name {
            if table.len() > MAX_TABLE_NAME_LENGTH {
                return Err(AppError::Validation(format!(
                    "Table name exceeds {} characters",
                    MAX_TABLE_NAME_LENGTH
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::QueryPolicy;
    use crate::models::{BulkChartRow, ServerName};

    fn bulk_row(id: i64, sql: &str) -> BulkChartRow {
        BulkChartRow {
            id,
            chart_group: "Key Metrics".to_string(),
            variable_name: format!("metric-{}", id),
            server_name: ServerName::P21,
            table_name: Some("oe_hdr".to_string()),
            sql_expression: sql.to_string(),
            production_sql_expression: None,
            value: None,
        }
    }

    #[test]
    fn rejects_non_select_statements() {
        let policy = QueryPolicy::new();
        assert!(policy
            .validate_sql("update chart_data set value=1")
            .is_err());
    }

    #[test]
    fn rejects_statements_with_semicolons() {
        let policy = QueryPolicy::new();
        assert!(policy.validate_sql("SELECT 1; DROP TABLE x").is_err());
    }

    #[test]
    fn accepts_simple_read_query() {
        let policy = QueryPolicy::new();
        assert!(policy
            .validate_sql("SELECT COUNT(*) as value FROM oe_hdr")
            .is_ok());
    }

    #[test]
    fn rejects_denied_keywords_case_insensitively() {
        let policy = QueryPolicy::new();
        assert!(policy.validate_sql("select * from x where exec_flag = 1").is_err());
        assert!(policy.validate_sql("SELECT 1 UNION SELECT 2 FROM inserted").is_err());
    }

    #[test]
    fn rejects_blank_and_oversized_sql() {
        let policy = QueryPolicy::new();
        assert!(policy.validate_sql("   ").is_err());
        let oversized = format!("SELECT '{}'", "x".repeat(70 * 1024));
        assert!(policy.validate_sql(&oversized).is_err());
    }

    #[test]
    fn bulk_rows_reject_duplicate_ids() {
        let policy = QueryPolicy::new();
        let rows = vec![bulk_row(1, "SELECT 1"), bulk_row(1, "SELECT 2")];
        let error = policy.validate_bulk_rows(&rows).unwrap_err();
        assert!(error.to_string().contains("Duplicate chart id 1"));
    }

    #[test]
    fn bulk_rows_accept_distinct_valid_rows() {
        let policy = QueryPolicy::new();
        let rows = vec![bulk_row(1, "SELECT 1"), bulk_row(2, "SELECT 2")];
        assert!(policy.validate_bulk_rows(&rows).is_ok());
    }
}
