use std::net::SocketAddr;
use std::sync::Arc;
use tenant_sentinel::{
    api::{create_router, AppState},
    audit::{AuditLogger, AuditLoggerConfig, PostgresAuditStorage},
    config::Config,
    db::{create_pool, run_migrations},
    notify::{Notifier, TracingSink},
    observability::{init_tracing, HealthChecker},
    overrides::OverrideService,
    rate_limit::{store::create_client, RateLimiter},
    spike::{spawn_detection_task, spawn_purge_task, SpikeDetector},
};
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    tracing::info!("Starting Tenant Sentinel service");
    tracing::info!("Configuration loaded: {:?}", config.server);

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;

    // Create Redis connection for rate-limit counters
    let redis_manager = create_client(&config.redis).await?;

    // Audit logging pipeline
    let audit_storage = Arc::new(PostgresAuditStorage::new(db_pool.clone()));
    let audit = Arc::new(AuditLogger::new(
        audit_storage,
        AuditLoggerConfig::from(&config.audit),
    ));

    // Rate limiter shared by the request path and operator actions
    let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
        redis_manager.clone(),
        config.rate_limit.clone(),
    )));

    // Notification dispatch
    let notifier = Arc::new(Notifier::new(db_pool.clone(), Box::new(TracingSink)));

    // Spike detection
    let detector = Arc::new(SpikeDetector::new(
        db_pool.clone(),
        audit.clone(),
        notifier.clone(),
        config.spike.clone(),
    ));
    if config.spike.enabled {
        spawn_detection_task(detector.clone(), config.spike.interval_seconds);
    }
    spawn_purge_task(rate_limiter.clone());

    // Manual override path
    let overrides = Arc::new(OverrideService::new(
        db_pool.clone(),
        audit.clone(),
        notifier.clone(),
        rate_limiter.clone(),
        config.overrides.clone(),
    ));

    let health_checker = Arc::new(HealthChecker::new(db_pool.clone(), redis_manager.clone()));

    let state = AppState {
        db_pool,
        rate_limiter,
        audit,
        overrides,
        detector,
        health_checker,
    };
    let app = create_router(state);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Tenant Sentinel is ready to accept requests");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
