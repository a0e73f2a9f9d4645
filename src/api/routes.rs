use crate::{
    api::{admin, health},
    audit::AuditLogger,
    observability::HealthChecker,
    overrides::OverrideService,
    rate_limit::{middleware::rate_limit_middleware, RateLimiter},
    spike::SpikeDetector,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub audit: Arc<AuditLogger>,
    pub overrides: Arc<OverrideService>,
    pub detector: Arc<SpikeDetector>,
    pub health_checker: Arc<HealthChecker>,
}

pub fn create_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_routes = Router::new()
        .route("/admin/spike-detection/run", post(admin::run_detection))
        .route("/admin/projects/:id/overrides", post(admin::create_override))
        .route("/admin/projects/:id/quotas", get(admin::project_quotas))
        .route("/admin/projects/:id/caps", put(admin::update_caps))
        .route("/admin/overrides", get(admin::list_overrides))
        .route("/admin/overrides/statistics", get(admin::override_statistics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        // Operator surface
        .nest("/v1", admin_routes)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}
