use crate::core::DashboardCore;
use crate::http::error::ApiError;
use crate::models::{
    AdminVariable, BooleanResponse, ConnectionTestResponse, SaveAdminVariablePayload,
    SaveServerConfigPayload, ServerConfig, ServerHealth, ServerName,
};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<DashboardCore>> {
    Router::new()
        .route("/admin/test-p21", get(test_p21))
        .route("/admin/test-por", get(test_por))
        .route("/admin/variables", get(list_variables).post(save_variable))
        .route("/admin/variables/:id", axum::routing::delete(delete_variable))
        .route(
            "/admin/server-configs",
            get(list_server_configs).post(save_server_config),
        )
        .route("/admin/connection-health", get(connection_health))
}

async fn test_p21(State(core): State<Arc<DashboardCore>>) -> Json<ConnectionTestResponse> {
    Json(core.test_connection(ServerName::P21).await)
}

async fn test_por(State(core): State<Arc<DashboardCore>>) -> Json<ConnectionTestResponse> {
    Json(core.test_connection(ServerName::Por).await)
}

async fn list_variables(
    State(core): State<Arc<DashboardCore>>,
) -> Result<Json<Vec<AdminVariable>>, ApiError> {
    Ok(Json(core.list_admin_variables()?))
}

async fn save_variable(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<SaveAdminVariablePayload>,
) -> Result<Json<AdminVariable>, ApiError> {
    Ok(Json(core.save_admin_variable(&payload)?))
}

async fn delete_variable(
    State(core): State<Arc<DashboardCore>>,
    Path(id): Path<String>,
) -> Result<Json<BooleanResponse>, ApiError> {
    core.delete_admin_variable(&id)?;
    Ok(Json(BooleanResponse { success: true }))
}

/// Passwords come back masked; the UI can echo the mask without
/// clobbering the stored secret.
async fn list_server_configs(
    State(core): State<Arc<DashboardCore>>,
) -> Result<Json<Vec<ServerConfig>>, ApiError> {
    Ok(Json(core.list_server_configs()?))
}

async fn save_server_config(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<SaveServerConfigPayload>,
) -> Result<Json<ServerConfig>, ApiError> {
    Ok(Json(core.save_server_config(&payload)?))
}

async fn connection_health(
    State(core): State<Arc<DashboardCore>>,
) -> Result<Json<Vec<ServerHealth>>, ApiError> {
    Ok(Json(core.connection_health()?))
}
