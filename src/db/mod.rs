use crate::errors::{AppError, AppResult};
use crate::models::{
    AdminVariable, BulkChartRow, ChartDataRow, ChartGroupSummary, SaveAdminVariablePayload,
    SaveChartPayload, SaveServerConfigPayload, ServerConfig, ServerName,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const CHART_COLUMNS: &str = "id, chart_group, variable_name, server_name, table_name, \
     sql_expression, production_sql_expression, value, last_updated";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.seed_default_charts()?;
        db.ensure_server_config_rows()?;

        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn list_charts(
        &self,
        group: Option<&str>,
        server: Option<ServerName>,
    ) -> AppResult<Vec<ChartDataRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut query = format!("SELECT {} FROM chart_data WHERE 1 = 1", CHART_COLUMNS);

        let mut params_vec: Vec<String> = Vec::new();
        if let Some(group) = group {
            query.push_str(" AND chart_group = ?");
            params_vec.push(group.to_string());
        }
        if let Some(server) = server {
            query.push_str(" AND server_name = ?");
            params_vec.push(server.as_str().to_string());
        }
        query.push_str(" ORDER BY id ASC");

        let mut statement = conn.prepare(&query)?;
        let dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        let rows = statement.query_map(rusqlite::params_from_iter(dyn_params), parse_chart_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_chart(&self, id: i64) -> AppResult<Option<ChartDataRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            &format!("SELECT {} FROM chart_data WHERE id = ?1", CHART_COLUMNS),
            [id],
            parse_chart_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Upsert by id. A payload without an id inserts a new row and returns
    /// the assigned id.
    pub fn save_chart(&self, payload: &SaveChartPayload) -> AppResult<ChartDataRow> {
        let now = Utc::now().to_rfc3339();
        let table_name = payload.table_name.clone().unwrap_or_default();
        let production_sql = payload
            .production_sql_expression
            .clone()
            .unwrap_or_else(|| payload.sql_expression.clone());

        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        let id = match payload.id {
            Some(id) => {
                let exists: bool = conn
                    .query_row(
                        "SELECT COUNT(*) > 0 FROM chart_data WHERE id = ?1",
                        [id],
                        |row| row.get(0),
                    )
                    .unwrap_or(false);
                if exists {
                    conn.execute(
                        "UPDATE chart_data SET chart_group = ?1, variable_name = ?2, server_name = ?3,
                           table_name = ?4, sql_expression = ?5, production_sql_expression = ?6,
                           value = COALESCE(?7, value), last_updated = ?8
                         WHERE id = ?9",
                        params![
                            payload.chart_group,
                            payload.variable_name,
                            payload.server_name.as_str(),
                            table_name,
                            payload.sql_expression,
                            production_sql,
                            payload.value,
                            now,
                            id,
                        ],
                    )?;
                } else {
                    conn.execute(
                        "INSERT INTO chart_data (
                           id, chart_group, variable_name, server_name, table_name,
                           sql_expression, production_sql_expression, value, last_updated
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            id,
                            payload.chart_group,
                            payload.variable_name,
                            payload.server_name.as_str(),
                            table_name,
                            payload.sql_expression,
                            production_sql,
                            payload.value.clone().unwrap_or_else(|| "0".to_string()),
                            now,
                        ],
                    )?;
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO chart_data (
                       chart_group, variable_name, server_name, table_name,
                       sql_expression, production_sql_expression, value, last_updated
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        payload.chart_group,
                        payload.variable_name,
                        payload.server_name.as_str(),
                        table_name,
                        payload.sql_expression,
                        production_sql,
                        payload.value.clone().unwrap_or_else(|| "0".to_string()),
                        now,
                    ],
                )?;
                conn.last_insert_rowid()
            }
        };

        conn.query_row(
            &format!("SELECT {} FROM chart_data WHERE id = ?1", CHART_COLUMNS),
            [id],
            parse_chart_row,
        )
        .map_err(AppError::from)
    }

    pub fn delete_chart(&self, id: i64) -> AppResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute("DELETE FROM chart_data WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Replaces the entire chart_data table with the given rows in one
    /// transaction, preserving the posted ids.
    pub fn replace_all_charts(&self, rows: &[BulkChartRow]) -> AppResult<usize> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chart_data", [])?;
        for row in rows {
            let production_sql = row
                .production_sql_expression
                .clone()
                .unwrap_or_else(|| row.sql_expression.clone());
            tx.execute(
                "INSERT INTO chart_data (
                   id, chart_group, variable_name, server_name, table_name,
                   sql_expression, production_sql_expression, value, last_updated
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id,
                    row.chart_group,
                    row.variable_name,
                    row.server_name.as_str(),
                    row.table_name.clone().unwrap_or_default(),
                    row.sql_expression,
                    production_sql,
                    row.value.clone().unwrap_or_else(|| "0".to_string()),
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn update_chart_value(&self, id: i64, value: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "UPDATE chart_data SET value = ?1, last_updated = ?2 WHERE id = ?3",
            params![value, now, id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Chart {} does not exist", id)));
        }
        Ok(())
    }

    pub fn list_chart_groups(&self) -> AppResult<Vec<ChartGroupSummary>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut statement = conn.prepare(
            "SELECT chart_group, COUNT(*) FROM chart_data GROUP BY chart_group ORDER BY chart_group",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(ChartGroupSummary {
                chart_group: row.get(0)?,
                row_count: row.get(1)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_charts(&self) -> AppResult<i64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM chart_data", [], |row| row.get(0))
            .map_err(AppError::from)
    }

    pub fn list_admin_variables(&self) -> AppResult<Vec<AdminVariable>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut statement = conn.prepare(
            "SELECT id, name, value, description, last_updated FROM admin_variables ORDER BY name",
        )?;
        let rows = statement.query_map([], parse_admin_variable_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Upsert keyed on the unique variable name; the id is kept stable
    /// across updates.
    pub fn save_admin_variable(
        &self,
        payload: &SaveAdminVariablePayload,
    ) -> AppResult<AdminVariable> {
        let now = Utc::now().to_rfc3339();
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        let existing_id: Option<String> = conn
            .query_row(
                "SELECT id FROM admin_variables WHERE name = ?1",
                [&payload.name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing_id {
            Some(id) => {
                conn.execute(
                    "UPDATE admin_variables SET value = ?1, description = ?2, last_updated = ?3
                     WHERE id = ?4",
                    params![payload.value, payload.description, now, id],
                )?;
                id
            }
            None => {
                let id = payload
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                conn.execute(
                    "INSERT INTO admin_variables (id, name, value, description, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, payload.name, payload.value, payload.description, now],
                )?;
                id
            }
        };

        conn.query_row(
            "SELECT id, name, value, description, last_updated FROM admin_variables WHERE id = ?1",
            [&id],
            parse_admin_variable_row,
        )
        .map_err(AppError::from)
    }

    pub fn delete_admin_variable(&self, id: &str) -> AppResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute("DELETE FROM admin_variables WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn get_server_config(&self, server: ServerName) -> AppResult<Option<ServerConfig>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT server_name, host, port, database_name, username, password, file_path,
                    is_active, last_updated
             FROM server_configs WHERE server_name = ?1",
            [server.as_str()],
            parse_server_config_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_server_configs(&self) -> AppResult<Vec<ServerConfig>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut statement = conn.prepare(
            "SELECT server_name, host, port, database_name, username, password, file_path,
                    is_active, last_updated
             FROM server_configs ORDER BY server_name",
        )?;
        let rows = statement.query_map([], parse_server_config_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Merges the payload over the stored row: absent payload fields keep
    /// their current values.
    pub fn upsert_server_config(
        &self,
        payload: &SaveServerConfigPayload,
    ) -> AppResult<ServerConfig> {
        let current = self.get_server_config(payload.server_name)?;
        let now = Utc::now().to_rfc3339();

        let merged = ServerConfig {
            server_name: payload.server_name,
            host: payload
                .host
                .clone()
                .or_else(|| current.as_ref().and_then(|c| c.host.clone())),
            port: payload.port.or_else(|| current.as_ref().and_then(|c| c.port)),
            database: payload
                .database
                .clone()
                .or_else(|| current.as_ref().and_then(|c| c.database.clone())),
            username: payload
                .username
                .clone()
                .or_else(|| current.as_ref().and_then(|c| c.username.clone())),
            password: payload
                .password
                .clone()
                .or_else(|| current.as_ref().and_then(|c| c.password.clone())),
            file_path: payload
                .file_path
                .clone()
                .or_else(|| current.as_ref().and_then(|c| c.file_path.clone())),
            is_active: payload
                .is_active
                .unwrap_or_else(|| current.as_ref().map(|c| c.is_active).unwrap_or(true)),
            last_updated: now.clone(),
        };

        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO server_configs (
               server_name, host, port, database_name, username, password, file_path,
               is_active, last_updated
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(server_name) DO UPDATE SET
               host = excluded.host,
               port = excluded.port,
               database_name = excluded.database_name,
               username = excluded.username,
               password = excluded.password,
               file_path = excluded.file_path,
               is_active = excluded.is_active,
               last_updated = excluded.last_updated",
            params![
                merged.server_name.as_str(),
                merged.host,
                merged.port,
                merged.database,
                merged.username,
                merged.password,
                merged.file_path,
                merged.is_active as i64,
                now,
            ],
        )?;

        Ok(merged)
    }

    fn ensure_server_config_rows(&self) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        for server in [ServerName::P21, ServerName::Por] {
            conn.execute(
                "INSERT OR IGNORE INTO server_configs (server_name, is_active, last_updated)
                 VALUES (?1, 1, ?2)",
                params![server.as_str(), now],
            )?;
        }
        Ok(())
    }

    fn seed_default_charts(&self) -> AppResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        // Seed only an empty table so restarts never duplicate rows.
        let empty: bool = conn
            .query_row("SELECT COUNT(*) = 0 FROM chart_data", [], |row| row.get(0))
            .unwrap_or(false);
        if !empty {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();

        struct ChartSeed<'a> {
            id: i64,
            chart_group: &'a str,
            variable_name: &'a str,
            server_name: ServerName,
            table_name: &'a str,
            sql: &'a str,
        }

        let seeds = [
            ChartSeed {
                id: 1,
                chart_group: "Key Metrics",
                variable_name: "Open Orders",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE completed = 'N'",
            },
            ChartSeed {
                id: 2,
                chart_group: "Key Metrics",
                variable_name: "Open Quotes",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE projected_order = 'Y'",
            },
            ChartSeed {
                id: 3,
                chart_group: "Accounts",
                variable_name: "Payables Due",
                server_name: ServerName::P21,
                table_name: "ap_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ap_open_items",
            },
            ChartSeed {
                id: 4,
                chart_group: "Accounts",
                variable_name: "Receivables Open",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items",
            },
            ChartSeed {
                id: 5,
                chart_group: "AR Aging",
                variable_name: "Current",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items WHERE days_past_due <= 0",
            },
            ChartSeed {
                id: 6,
                chart_group: "AR Aging",
                variable_name: "1-30 Days",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items WHERE days_past_due BETWEEN 1 AND 30",
            },
            ChartSeed {
                id: 7,
                chart_group: "AR Aging",
                variable_name: "31-60 Days",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items WHERE days_past_due BETWEEN 31 AND 60",
            },
            ChartSeed {
                id: 8,
                chart_group: "AR Aging",
                variable_name: "61-90 Days",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items WHERE days_past_due BETWEEN 61 AND 90",
            },
            ChartSeed {
                id: 9,
                chart_group: "AR Aging",
                variable_name: "90+ Days",
                server_name: ServerName::P21,
                table_name: "ar_open_items",
                sql: "SELECT SUM(amount_due) AS value FROM ar_open_items WHERE days_past_due > 90",
            },
            ChartSeed {
                id: 10,
                chart_group: "Customer Metrics",
                variable_name: "Active Customers",
                server_name: ServerName::P21,
                table_name: "customer",
                sql: "SELECT COUNT(*) AS value FROM customer WHERE active_flag = 'Y'",
            },
            ChartSeed {
                id: 11,
                chart_group: "Customer Metrics",
                variable_name: "New Customers MTD",
                server_name: ServerName::P21,
                table_name: "customer",
                sql: "SELECT COUNT(*) AS value FROM customer WHERE first_sale_date >= DATEADD(day, 1 - DAY(GETDATE()), CAST(GETDATE() AS DATE))",
            },
            ChartSeed {
                id: 12,
                chart_group: "Daily Orders",
                variable_name: "Orders Today",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE order_date >= CAST(GETDATE() AS DATE)",
            },
            ChartSeed {
                id: 13,
                chart_group: "Historical Data",
                variable_name: "Sales MTD",
                server_name: ServerName::P21,
                table_name: "invoice_hdr",
                sql: "SELECT SUM(total_amount) AS value FROM invoice_hdr WHERE invoice_date >= DATEADD(day, 1 - DAY(GETDATE()), CAST(GETDATE() AS DATE))",
            },
            ChartSeed {
                id: 14,
                chart_group: "Historical Data",
                variable_name: "Sales YTD",
                server_name: ServerName::P21,
                table_name: "invoice_hdr",
                sql: "SELECT SUM(total_amount) AS value FROM invoice_hdr WHERE YEAR(invoice_date) = YEAR(GETDATE())",
            },
            ChartSeed {
                id: 15,
                chart_group: "Inventory",
                variable_name: "Stocked Items",
                server_name: ServerName::P21,
                table_name: "inv_mast",
                sql: "SELECT COUNT(*) AS value FROM inv_mast WHERE inactive = 'N'",
            },
            ChartSeed {
                id: 16,
                chart_group: "POR Overview",
                variable_name: "Open Rentals",
                server_name: ServerName::Por,
                table_name: "Transactions",
                sql: "SELECT COUNT(*) AS value FROM Transactions WHERE Status = 'Open'",
            },
            ChartSeed {
                id: 17,
                chart_group: "POR Overview",
                variable_name: "Overdue Returns",
                server_name: ServerName::Por,
                table_name: "Transactions",
                sql: "SELECT COUNT(*) AS value FROM Transactions WHERE Status = 'Out' AND DueDate < Date()",
            },
            ChartSeed {
                id: 18,
                chart_group: "Site Distribution",
                variable_name: "Columbus Orders",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE location_id = 101 AND completed = 'N'",
            },
            ChartSeed {
                id: 19,
                chart_group: "Site Distribution",
                variable_name: "Addison Orders",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE location_id = 102 AND completed = 'N'",
            },
            ChartSeed {
                id: 20,
                chart_group: "Web Orders",
                variable_name: "Web Orders Today",
                server_name: ServerName::P21,
                table_name: "oe_hdr",
                sql: "SELECT COUNT(*) AS value FROM oe_hdr WHERE web_reference_no <> '' AND order_date >= CAST(GETDATE() AS DATE)",
            },
        ];

        for seed in &seeds {
            conn.execute(
                "INSERT INTO chart_data (
                   id, chart_group, variable_name, server_name, table_name,
                   sql_expression, production_sql_expression, value, last_updated
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, '0', ?7)",
                params![
                    seed.id,
                    seed.chart_group,
                    seed.variable_name,
                    seed.server_name.as_str(),
                    seed.table_name,
                    seed.sql,
                    now,
                ],
            )?;
        }

        Ok(())
    }
}

fn parse_chart_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChartDataRow> {
    Ok(ChartDataRow {
        id: row.get(0)?,
        chart_group: row.get(1)?,
        variable_name: row.get(2)?,
        server_name: parse_server_name(&row.get::<_, String>(3)?)?,
        table_name: row.get(4)?,
        sql_expression: row.get(5)?,
        production_sql_expression: row.get(6)?,
        value: row.get(7)?,
        last_updated: row.get(8)?,
    })
}

fn parse_admin_variable_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdminVariable> {
    Ok(AdminVariable {
        id: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
        description: row.get(3)?,
        last_updated: row.get(4)?,
    })
}

fn parse_server_config_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServerConfig> {
    Ok(ServerConfig {
        server_name: parse_server_name(&row.get::<_, String>(0)?)?,
        host: row.get(1)?,
        port: row.get(2)?,
        database: row.get(3)?,
        username: row.get(4)?,
        password: row.get(5)?,
        file_path: row.get(6)?,
        is_active: row.get::<_, i64>(7)? != 0,
        last_updated: row.get(8)?,
    })
}

fn parse_server_name(raw: &str) -> rusqlite::Result<ServerName> {
    ServerName::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown server name '{}'", raw),
            )),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::models::{
        BulkChartRow, SaveAdminVariablePayload, SaveChartPayload, SaveServerConfigPayload,
        ServerName,
    };

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(&dir.path().join("test.db")).expect("db")
    }

    #[test]
    fn seeds_default_charts_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");
        let db = Database::new(&db_path).expect("db");
        let count = db.count_charts().expect("count");
        assert!(count > 0);
        drop(db);

        let db = Database::new(&db_path).expect("db reopen");
        assert_eq!(db.count_charts().expect("count"), count);
    }

    #[test]
    fn chart_round_trips_sql_and_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        let saved = db
            .save_chart(&SaveChartPayload {
                id: None,
                chart_group: "Inventory".to_string(),
                variable_name: "Bin Count".to_string(),
                server_name: ServerName::Por,
                table_name: Some("ItemFile".to_string()),
                sql_expression: "SELECT COUNT(*) AS value FROM ItemFile".to_string(),
                production_sql_expression: None,
                value: None,
            })
            .expect("save chart");

        let loaded = db
            .get_chart(saved.id)
            .expect("get chart")
            .expect("chart exists");
        assert_eq!(loaded.sql_expression, "SELECT COUNT(*) AS value FROM ItemFile");
        assert_eq!(loaded.server_name, ServerName::Por);
        assert_eq!(loaded.production_sql_expression, loaded.sql_expression);
    }

    #[test]
    fn save_with_existing_id_updates_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        let updated = db
            .save_chart(&SaveChartPayload {
                id: Some(1),
                chart_group: "Key Metrics".to_string(),
                variable_name: "Open Orders".to_string(),
                server_name: ServerName::P21,
                table_name: Some("oe_hdr".to_string()),
                sql_expression: "SELECT COUNT(*) AS value FROM oe_hdr".to_string(),
                production_sql_expression: None,
                value: None,
            })
            .expect("update chart");
        assert_eq!(updated.id, 1);
        assert_eq!(updated.sql_expression, "SELECT COUNT(*) AS value FROM oe_hdr");

        let before = db.count_charts().expect("count");
        db.save_chart(&SaveChartPayload {
            id: Some(1),
            chart_group: "Key Metrics".to_string(),
            variable_name: "Open Orders".to_string(),
            server_name: ServerName::P21,
            table_name: None,
            sql_expression: "SELECT 2 AS value".to_string(),
            production_sql_expression: None,
            value: None,
        })
        .expect("second update");
        assert_eq!(db.count_charts().expect("count"), before);
    }

    #[test]
    fn bulk_replace_clears_previous_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        assert!(db.count_charts().expect("count") > 2);

        let rows = vec![
            BulkChartRow {
                id: 100,
                chart_group: "Key Metrics".to_string(),
                variable_name: "A".to_string(),
                server_name: ServerName::P21,
                table_name: None,
                sql_expression: "SELECT 1 AS value".to_string(),
                production_sql_expression: None,
                value: Some("1".to_string()),
            },
            BulkChartRow {
                id: 200,
                chart_group: "POR Overview".to_string(),
                variable_name: "B".to_string(),
                server_name: ServerName::Por,
                table_name: None,
                sql_expression: "SELECT 2 AS value".to_string(),
                production_sql_expression: None,
                value: None,
            },
        ];
        let inserted = db.replace_all_charts(&rows).expect("replace");
        assert_eq!(inserted, 2);
        assert_eq!(db.count_charts().expect("count"), 2);
        let loaded = db.get_chart(200).expect("get").expect("row 200");
        assert_eq!(loaded.variable_name, "B");
    }

    #[test]
    fn update_chart_value_touches_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        let before = db.get_chart(1).expect("get").expect("seed row");
        db.update_chart_value(1, "42.5").expect("update value");
        let after = db.get_chart(1).expect("get").expect("seed row");
        assert_eq!(after.value, "42.5");
        assert!(after.last_updated >= before.last_updated);
    }

    #[test]
    fn update_chart_value_requires_existing_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        assert!(db.update_chart_value(99_999, "1").is_err());
    }

    #[test]
    fn chart_group_summaries_cover_seed_groups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        let groups = db.list_chart_groups().expect("groups");
        assert!(groups.iter().any(|g| g.chart_group == "AR Aging" && g.row_count == 5));
    }

    #[test]
    fn admin_variable_upsert_keeps_id_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        let first = db
            .save_admin_variable(&SaveAdminVariablePayload {
                id: None,
                name: "show_por_charts".to_string(),
                value: "true".to_string(),
                description: Some("Toggle POR chart groups".to_string()),
            })
            .expect("save variable");

        let second = db
            .save_admin_variable(&SaveAdminVariablePayload {
                id: None,
                name: "show_por_charts".to_string(),
                value: "false".to_string(),
                description: None,
            })
            .expect("save variable again");

        assert_eq!(first.id, second.id);
        assert_eq!(second.value, "false");
        assert_eq!(db.list_admin_variables().expect("list").len(), 1);
    }

    #[test]
    fn server_config_merge_preserves_absent_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        db.upsert_server_config(&SaveServerConfigPayload {
            server_name: ServerName::P21,
            host: Some("p21.example.local".to_string()),
            port: Some(1433),
            database: Some("P21".to_string()),
            username: Some("dashboard".to_string()),
            password: Some("hunter2".to_string()),
            file_path: None,
            is_active: None,
        })
        .expect("initial config");

        let merged = db
            .upsert_server_config(&SaveServerConfigPayload {
                server_name: ServerName::P21,
                host: None,
                port: None,
                database: None,
                username: None,
                password: None,
                file_path: None,
                is_active: Some(false),
            })
            .expect("merge config");

        assert_eq!(merged.host.as_deref(), Some("p21.example.local"));
        assert_eq!(merged.password.as_deref(), Some("hunter2"));
        assert!(!merged.is_active);
    }

    #[test]
    fn server_config_rows_exist_for_both_servers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        let configs = db.list_server_configs().expect("list configs");
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().any(|c| c.server_name == ServerName::P21));
        assert!(configs.iter().any(|c| c.server_name == ServerName::Por));
    }
}
