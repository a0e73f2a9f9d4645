//! Operator-facing admin handlers. Every handler resolves the acting
//! identity from the trusted auth headers and passes the role gate
//! before touching state.

use crate::api::routes::AppState;
use crate::authz::{actor_from_headers, require_operator_or_admin};
use crate::db;
use crate::errors::{AppError, Result};
use crate::overrides::OverrideRequest;
use crate::quota;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Manual detection triggers per operator-hour, separate from the
/// automatic schedule
const DETECTION_TRIGGERS_PER_HOUR: u64 = 6;

/// On-demand spike detection, rate-limited separately from the
/// automatic schedule
pub async fn run_detection(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    require_operator_or_admin(&actor, &state.audit).await?;

    let decision = {
        let mut limiter = state.rate_limiter.lock().await;
        limiter
            .check_detection_trigger(actor.id, DETECTION_TRIGGERS_PER_HOUR)
            .await
    };
    if !decision.allowed {
        return Err(AppError::RateLimitExceeded {
            retry_after_seconds: decision.retry_after().unwrap_or(0),
        });
    }

    let report = state.detector.run().await;
    Ok(Json(serde_json::to_value(report).map_err(|e| {
        AppError::Internal(format!("report serialization: {}", e))
    })?))
}

pub async fn create_override(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let record = state.overrides.execute(&actor, project_id, request).await?;

    Ok(Json(serde_json::to_value(record).map_err(|e| {
        AppError::Internal(format!("override serialization: {}", e))
    })?))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_overrides(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let records = state
        .overrides
        .get_all_overrides(&actor, page.limit, page.offset)
        .await?;

    Ok(Json(serde_json::json!({
        "overrides": records,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

pub async fn override_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let stats = state.overrides.get_override_statistics(&actor).await?;

    Ok(Json(serde_json::to_value(stats).map_err(|e| {
        AppError::Internal(format!("statistics serialization: {}", e))
    })?))
}

/// Cap/usage/status snapshot for one project, including any unresolved
/// suspension so the caller can self-diagnose
pub async fn project_quotas(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    require_operator_or_admin(&actor, &state.audit).await?;

    let snapshots = quota::usage_snapshot(&state.db_pool, project_id, Utc::now()).await?;
    let suspension = db::suspensions::get_unresolved(&state.db_pool, project_id).await?;

    Ok(Json(serde_json::json!({
        "project_id": project_id,
        "quotas": snapshots,
        "unresolved_suspension": suspension,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CapUpdateBody {
    pub reason: String,
    pub caps: Vec<crate::overrides::service::CapUpdate>,
}

/// Quota updates route through the override path so they carry the
/// same audit trail and rate limit as any other intervention
pub async fn update_caps(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CapUpdateBody>,
) -> Result<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let request = OverrideRequest {
        action: "adjust_caps".to_string(),
        reason: body.reason,
        notes: None,
        caps: body.caps,
    };

    let record = state.overrides.execute(&actor, project_id, request).await?;
    Ok(Json(serde_json::to_value(record).map_err(|e| {
        AppError::Internal(format!("override serialization: {}", e))
    })?))
}
