pub mod admin;
pub mod charts;
pub mod error;
pub mod query;

use crate::core::DashboardCore;
use crate::http::error::ApiError;
use crate::models::HealthResponse;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Builds the full application router: every endpoint lives under /api,
/// with request ids, tracing, and permissive CORS applied outermost.
pub fn router(core: Arc<DashboardCore>) -> Router {
    let api = Router::new()
        .merge(charts::router())
        .merge(query::router())
        .merge(admin::router())
        .route("/health", get(health));

    Router::new()
        .nest("/api", api)
        .with_state(core)
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health(
    State(core): State<Arc<DashboardCore>>,
) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(core.health()?))
}
