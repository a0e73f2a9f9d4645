use crate::domain::audit::PersistedAuditEvent;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

/// Trait for audit event storage backends
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Write a batch of audit events to storage
    async fn write_batch(&self, events: Vec<PersistedAuditEvent>) -> Result<()>;
}

/// PostgreSQL storage backend for audit logs. Append-only: nothing in
/// this crate updates or deletes rows once written.
pub struct PostgresAuditStorage {
    pool: PgPool,
}

impl PostgresAuditStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStorage for PostgresAuditStorage {
    async fn write_batch(&self, events: Vec<PersistedAuditEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for event in events {
            let e = &event.event;

            sqlx::query(
                r#"
                INSERT INTO audit_logs (
                    id, log_type, severity, project_id, developer_id,
                    action, details, ip_address, user_agent, occurred_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(event.id)
            .bind(e.log_type.as_str())
            .bind(e.severity.as_str())
            .bind(e.project_id)
            .bind(e.developer_id)
            .bind(&e.action)
            .bind(&e.details)
            .bind(&e.ip_address)
            .bind(&e.user_agent)
            .bind(e.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to insert audit log: {:?}", e);
                AppError::Database(e)
            })?;
        }

        tx.commit().await?;

        Ok(())
    }
}

/// In-memory storage backend (for testing)
#[cfg(test)]
pub struct InMemoryAuditStorage {
    events: std::sync::Arc<tokio::sync::Mutex<Vec<PersistedAuditEvent>>>,
    fail_writes: bool,
}

#[cfg(test)]
impl InMemoryAuditStorage {
    pub fn new() -> Self {
        Self {
            events: std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new())),
            fail_writes: false,
        }
    }

    /// A backend whose every write fails, for fail-open tests
    pub fn failing() -> Self {
        Self {
            events: std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new())),
            fail_writes: true,
        }
    }

    pub async fn get_events(&self) -> Vec<PersistedAuditEvent> {
        self.events.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl AuditStorage for InMemoryAuditStorage {
    async fn write_batch(&self, events: Vec<PersistedAuditEvent>) -> Result<()> {
        if self.fail_writes {
            return Err(AppError::StorageUnavailable(
                "test backend rejects writes".to_string(),
            ));
        }
        self.events.lock().await.extend(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditEvent, LogType, Severity};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = InMemoryAuditStorage::new();

        let event = PersistedAuditEvent {
            id: Uuid::new_v4(),
            event: AuditEvent::new(LogType::BackgroundJob, Severity::Info, "detection_run"),
        };

        storage.write_batch(vec![event.clone()]).await.unwrap();

        let stored = storage.get_events().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, event.id);
    }

    #[tokio::test]
    async fn test_failing_storage_reports_unavailable() {
        let storage = InMemoryAuditStorage::failing();

        let event = PersistedAuditEvent {
            id: Uuid::new_v4(),
            event: AuditEvent::new(LogType::BackgroundJob, Severity::Info, "detection_run"),
        };

        let err = storage.write_batch(vec![event]).await.unwrap_err();
        assert!(err.is_storage_error());
    }
}
