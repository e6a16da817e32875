//! Liveness and readiness endpoints, open to unauthenticated callers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses((status = 200, description = "Service identity and environment")),
    tag = "status"
)]
pub async fn service_status(State(state): State<Arc<AppState>>) -> Response {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
    .into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable")
    ),
    tag = "status"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.db.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "database": "up" })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed to reach database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "degraded", "database": "down" })),
            )
                .into_response()
        }
    }
}
