use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use uuid::Uuid;

/// Application-wide error type
#[derive(Debug)]
pub enum AppError {
    // Database errors
    Database(sqlx::Error),
    DatabaseMigration(sqlx::migrate::MigrateError),

    // Redis errors
    Redis(redis::RedisError),

    // The durable store could not serve a request that must not fail open
    StorageUnavailable(String),

    // Authentication / authorization errors
    Unauthorized,
    Forbidden { actor_id: Option<Uuid> },

    // Rate limiting
    RateLimitExceeded { retry_after_seconds: u64 },

    // Validation errors
    Validation(String),

    // Lookup errors
    ProjectNotFound(Uuid),
    SuspensionNotFound(Uuid),

    // Configuration errors
    Configuration(String),

    // Internal errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::DatabaseMigration(e) => write!(f, "Database migration error: {}", e),
            AppError::Redis(e) => write!(f, "Redis error: {}", e),
            AppError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::Forbidden { actor_id } => match actor_id {
                Some(id) => write!(f, "Forbidden for actor {}", id),
                None => write!(f, "Forbidden"),
            },
            AppError::RateLimitExceeded {
                retry_after_seconds,
            } => write!(f, "Rate limit exceeded, retry after {}s", retry_after_seconds),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::ProjectNotFound(id) => write!(f, "Project not found: {}", id),
            AppError::SuspensionNotFound(id) => write!(f, "Suspension not found: {}", id),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseMigration(err)
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Redis(err)
    }
}

impl AppError {
    /// Whether this error may be absorbed by a fail-open path.
    /// Only infrastructure errors qualify; authorization and validation
    /// failures must always surface.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::DatabaseMigration(_)
                | AppError::Redis(_)
                | AppError::StorageUnavailable(_)
        )
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, mut body) = match &self {
            AppError::Database(_) | AppError::DatabaseMigration(_) => {
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
            AppError::Redis(_) => {
                tracing::error!("Redis error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
            AppError::StorageUnavailable(_) => {
                tracing::error!("Storage unavailable: {:?}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({"error": "Storage unavailable"}),
                )
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({"error": "Unauthorized"})),
            AppError::Forbidden { actor_id } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "Operator or admin role required",
                    "actor_id": actor_id,
                }),
            ),
            AppError::RateLimitExceeded {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Rate limit exceeded",
                    "retry_after_seconds": retry_after_seconds,
                }),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            AppError::ProjectNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({"error": "Project not found", "project_id": id}),
            ),
            AppError::SuspensionNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({"error": "Suspension not found", "suspension_id": id}),
            ),
            AppError::Configuration(_) => {
                tracing::error!("Configuration error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
        };

        if let Some(obj) = body.as_object_mut() {
            obj.insert("status".to_string(), json!(status.as_u16()));
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_classification() {
        assert!(AppError::StorageUnavailable("timeout".into()).is_storage_error());
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_storage_error());
        assert!(!AppError::Unauthorized.is_storage_error());
        assert!(!AppError::Validation("bad input".into()).is_storage_error());
        assert!(!AppError::Forbidden { actor_id: None }.is_storage_error());
    }

    #[test]
    fn test_display_includes_retry_hint() {
        let err = AppError::RateLimitExceeded {
            retry_after_seconds: 42,
        };
        assert!(err.to_string().contains("42"));
    }
}
