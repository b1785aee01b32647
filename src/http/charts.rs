use crate::core::DashboardCore;
use crate::http::error::ApiError;
use crate::models::{
    BooleanResponse, BulkChartRow, ChartDataRow, ChartGroupSummary, ChartListFilter,
    ChartRefreshResult, SaveChartPayload,
};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLoadResponse {
    pub success: bool,
    pub row_count: usize,
}

pub fn router() -> Router<Arc<DashboardCore>> {
    Router::new()
        .route("/charts", get(list_charts).post(save_chart))
        .route("/charts/bulk", post(bulk_load))
        .route("/charts/:id", get(get_chart).delete(delete_chart))
        .route("/charts/:id/refresh", post(refresh_chart))
        .route("/chart-groups", get(chart_groups))
}

async fn list_charts(
    State(core): State<Arc<DashboardCore>>,
    Query(filter): Query<ChartListFilter>,
) -> Result<Json<Vec<ChartDataRow>>, ApiError> {
    Ok(Json(core.list_charts(&filter)?))
}

async fn save_chart(
    State(core): State<Arc<DashboardCore>>,
    Json(payload): Json<SaveChartPayload>,
) -> Result<Json<ChartDataRow>, ApiError> {
    Ok(Json(core.save_chart(&payload)?))
}

async fn get_chart(
    State(core): State<Arc<DashboardCore>>,
    Path(id): Path<i64>,
) -> Result<Json<ChartDataRow>, ApiError> {
    Ok(Json(core.get_chart(id)?))
}

async fn delete_chart(
    State(core): State<Arc<DashboardCore>>,
    Path(id): Path<i64>,
) -> Result<Json<BooleanResponse>, ApiError> {
    core.delete_chart(id)?;
    Ok(Json(BooleanResponse { success: true }))
}

/// Replaces the entire chart table with the posted array.
async fn bulk_load(
    State(core): State<Arc<DashboardCore>>,
    Json(rows): Json<Vec<BulkChartRow>>,
) -> Result<Json<BulkLoadResponse>, ApiError> {
    let row_count = core.replace_all_charts(&rows)?;
    Ok(Json(BulkLoadResponse {
        success: true,
        row_count,
    }))
}

async fn refresh_chart(
    State(core): State<Arc<DashboardCore>>,
    Path(id): Path<i64>,
) -> Result<Json<ChartRefreshResult>, ApiError> {
    Ok(Json(core.refresh_chart(id).await?))
}

async fn chart_groups(
    State(core): State<Arc<DashboardCore>>,
) -> Result<Json<Vec<ChartGroupSummary>>, ApiError> {
    Ok(Json(core.chart_groups()?))
}
