use dashboard_server::connectors::{Connector, Dispatcher, P21Connector, PorConnector};
use dashboard_server::core::DashboardCore;
use dashboard_server::db::Database;
use dashboard_server::errors::AppError;
use dashboard_server::models::ServerName;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_reader() -> String {
    PathBuf::from("tests/fixtures/mock-mdb-sql.sh")
        .display()
        .to_string()
}

fn stub_mdb_file(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("por.mdb");
    std::fs::write(&path, b"jet4 stub").expect("write stub mdb");
    path.display().to_string()
}

fn fixture_connector(dir: &tempfile::TempDir) -> PorConnector {
    let db = Arc::new(Database::new(&dir.path().join("por.db")).expect("open database"));
    PorConnector::new(db, Some(stub_mdb_file(dir)), fixture_reader())
}

#[test]
fn fixture_script_exists() {
    assert!(PathBuf::from("tests/fixtures/mock-mdb-sql.sh").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn por_query_round_trips_delimited_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let connector = fixture_connector(&dir);

    let outcome = connector
        .execute("SELECT COUNT(*) AS value FROM Transactions")
        .await
        .expect("execute against fixture");
    assert_eq!(outcome.columns, vec!["value"]);
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.scalar(), "17");
}

#[cfg(unix)]
#[tokio::test]
async fn por_multi_column_result_falls_back_to_first_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let connector = fixture_connector(&dir);

    let outcome = connector
        .execute("SELECT Status, COUNT(*) FROM ItemStatus GROUP BY Status")
        .await
        .expect("execute against fixture");
    assert_eq!(outcome.columns, vec!["status", "count"]);
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.rows[0]["count"], serde_json::json!(9));
    assert_eq!(outcome.scalar(), "Open");
}

#[cfg(unix)]
#[tokio::test]
async fn reader_stderr_surfaces_as_sql_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let connector = fixture_connector(&dir);

    let error = connector
        .execute("SELECT broken FROM Transactions")
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Sql(_)));
    assert!(error.to_string().contains("syntax error"));
}

#[cfg(unix)]
#[tokio::test]
async fn probe_reports_reader_version_and_file_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let connector = fixture_connector(&dir);

    let outcome = connector.probe().await.expect("probe fixture");
    assert!(outcome.message.contains("1.0.0"));
    assert!(outcome.message.contains("bytes"));
}

#[cfg(unix)]
#[tokio::test]
async fn ad_hoc_por_query_flows_through_the_core() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(Database::new(&dir.path().join("dashboard.db")).expect("open database"));
    let p21 = Arc::new(P21Connector::new(Arc::clone(&db), None));
    let por = Arc::new(PorConnector::new(
        Arc::clone(&db),
        Some(stub_mdb_file(&dir)),
        fixture_reader(),
    ));
    let core = DashboardCore::new(db, Dispatcher::new(p21, por));

    let response = core
        .execute_ad_hoc(
            ServerName::Por,
            "SELECT COUNT(*) AS value FROM Transactions",
        )
        .await
        .expect("ad hoc query");
    assert!(response.success);
    assert_eq!(response.value.as_deref(), Some("17"));
    assert_eq!(response.row_count, 1);

    let rejected = core
        .execute_ad_hoc(ServerName::Por, "DELETE FROM Transactions")
        .await
        .unwrap_err();
    assert!(matches!(rejected, AppError::Validation(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn refreshing_a_por_chart_caches_the_scalar() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(Database::new(&dir.path().join("dashboard.db")).expect("open database"));
    let p21 = Arc::new(P21Connector::new(Arc::clone(&db), None));
    let por = Arc::new(PorConnector::new(
        Arc::clone(&db),
        Some(stub_mdb_file(&dir)),
        fixture_reader(),
    ));
    let core = DashboardCore::new(Arc::clone(&db), Dispatcher::new(p21, por));

    let chart = core
        .save_chart(&dashboard_server::models::SaveChartPayload {
            id: None,
            chart_group: "POR Overview".to_string(),
            variable_name: "Open Transactions".to_string(),
            server_name: ServerName::Por,
            table_name: Some("Transactions".to_string()),
            sql_expression: "SELECT COUNT(*) AS value FROM Transactions".to_string(),
            production_sql_expression: None,
            value: None,
        })
        .expect("save chart");

    let result = core.refresh_chart(chart.id).await.expect("refresh");
    assert!(result.success);
    assert_eq!(result.value.as_deref(), Some("17"));

    let cached = db
        .get_chart(chart.id)
        .expect("get chart")
        .expect("chart exists");
    assert_eq!(cached.value, "17");
}
