use crate::core::DashboardCore;
use crate::http::error::ApiError;
use crate::models::{
    AdHocQueryPayload, ConnectionTestResponse, QueryResponse, ServerName, TestConnectionPayload,
};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<DashboardCore>> {
    Router::new()
        .route("/testConnection", post(test_connection))
        .route("/executePORQuery", post(execute_por_query))
        .route("/test-p21-query", post(test_p21_query))
}

/// Probe outcome is data, not an error: the admin page renders both the
/// success and failure cases from the same shape.
async fn test_connection(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<TestConnectionPayload>,
) -> Json<ConnectionTestResponse> {
    Json(core.test_connection(payload.server_name).await)
}

async fn execute_por_query(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<AdHocQueryPayload>,
) -> Result<Json<QueryResponse>, ApiError> {
    Ok(Json(core.execute_ad_hoc(ServerName::Por, &payload.sql).await?))
}

async fn test_p21_query(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<AdHocQueryPayload>,
) -> Result<Json<QueryResponse>, ApiError> {
    Ok(Json(core.execute_ad_hoc(ServerName::P21, &payload.sql).await?))
}
