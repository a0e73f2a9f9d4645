use crate::api::routes::AppState;
use crate::observability::metrics as metrics_registry;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// Liveness probe
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health_checker.liveness().await)
}

/// Readiness probe: degraded when Postgres or Redis is unreachable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health_checker.readiness().await;
    let code = if status.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}

/// Prometheus exposition endpoint
pub async fn metrics() -> impl IntoResponse {
    metrics_registry::gather()
}
