//! Role gate for the admin surface.
//!
//! Every state-mutating override, statistics query, and manual
//! detection trigger passes through `require_operator_or_admin` before
//! touching state. Roles are a closed enumeration with a total order;
//! nothing here branches on role strings.

use crate::audit::AuditLogger;
use crate::domain::actor::{Actor, Role};
use crate::domain::audit::{AuditEvent, LogType, Severity};
use crate::errors::{AppError, Result};
use crate::rate_limit::middleware::extract_client_ip;
use axum::http::HeaderMap;

/// Admit operators and admins; reject everyone else with a typed 403.
/// A denied check writes exactly one auth_failure audit entry and
/// mutates nothing.
pub async fn require_operator_or_admin<'a>(
    actor: &'a Actor,
    audit: &AuditLogger,
) -> Result<&'a Actor> {
    if actor.role >= Role::Operator {
        return Ok(actor);
    }

    let event = AuditEvent::new(LogType::AuthFailure, Severity::Warning, "role_check_failed")
        .with_developer(actor.id)
        .with_context(actor.ip_address.clone(), actor.user_agent.clone())
        .with_details(serde_json::json!({
            "required_role": Role::Operator.as_str(),
            "actual_role": actor.role.as_str(),
        }));
    let _ = audit.log(event).await;

    Err(AppError::Forbidden {
        actor_id: Some(actor.id),
    })
}

/// Build the acting identity from the trusted headers the platform's
/// auth layer sets on proxied admin requests
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(AppError::Unauthorized)?;

    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::from_str)
        .ok_or(AppError::Unauthorized)?;

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    Ok(Actor::new(id, role).with_context(Some(extract_client_ip(headers)), user_agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::storage::InMemoryAuditStorage;
    use crate::audit::AuditLoggerConfig;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_logger() -> (Arc<InMemoryAuditStorage>, AuditLogger) {
        let storage = Arc::new(InMemoryAuditStorage::new());
        let config = AuditLoggerConfig {
            batch_size: 1,
            batch_timeout_ms: 10,
            channel_buffer_size: 16,
        };
        let logger = AuditLogger::new(storage.clone(), config);
        (storage, logger)
    }

    #[tokio::test]
    async fn test_operator_and_admin_pass() {
        let (_storage, logger) = test_logger();

        for role in [Role::Operator, Role::Admin] {
            let actor = Actor::new(Uuid::new_v4(), role);
            assert!(require_operator_or_admin(&actor, &logger).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_developer_rejected_with_audit_entry() {
        let (storage, logger) = test_logger();
        let actor = Actor::new(Uuid::new_v4(), Role::Developer);

        let err = require_operator_or_admin(&actor, &logger)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden { actor_id: Some(id) } if id == actor.id
        ));

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let events = storage.get_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.log_type, LogType::AuthFailure);
        assert_eq!(events[0].event.developer_id, Some(actor.id));
    }

    #[test]
    fn test_actor_from_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert("x-actor-role", HeaderValue::from_static("operator"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.42"));

        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.role, Role::Operator);
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.42"));
    }

    #[test]
    fn test_missing_or_malformed_identity_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            actor_from_headers(&headers),
            Err(AppError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_static("not-a-uuid"));
        headers.insert("x-actor-role", HeaderValue::from_static("operator"));
        assert!(matches!(
            actor_from_headers(&headers),
            Err(AppError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-actor-id",
            HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
        );
        headers.insert("x-actor-role", HeaderValue::from_static("superuser"));
        assert!(matches!(
            actor_from_headers(&headers),
            Err(AppError::Unauthorized)
        ));
    }
}
