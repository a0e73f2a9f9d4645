use crate::audit::storage::AuditStorage;
use crate::domain::audit::{AuditEvent, PersistedAuditEvent, Severity};
use crate::errors::Result;
use crate::observability::metrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Configuration for the audit logger
#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub channel_buffer_size: usize,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_timeout_ms: 1000,
            channel_buffer_size: 10000,
        }
    }
}

impl From<&crate::config::AuditConfig> for AuditLoggerConfig {
    fn from(config: &crate::config::AuditConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_timeout_ms: config.flush_interval_ms,
            channel_buffer_size: config.channel_buffer_size,
        }
    }
}

/// Async audit logger with batching.
///
/// `log` returns a Result the caller is permitted to ignore: an audit
/// write failure must never block the primary action it describes.
/// Storage errors are absorbed by the batch processor and reported to
/// local diagnostics only.
pub struct AuditLogger {
    sender: mpsc::Sender<AuditEvent>,
}

impl AuditLogger {
    /// Create a new audit logger with the given storage backend and configuration
    pub fn new(storage: Arc<dyn AuditStorage>, config: AuditLoggerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_buffer_size);

        // Spawn the background batch processor
        tokio::spawn(batch_processor(receiver, storage, config));

        Self { sender }
    }

    /// Queue an audit event. Routes the event's severity to the matching
    /// diagnostic channel before enqueueing, so the entry is visible in
    /// logs even if the durable write later fails.
    pub async fn log(&self, event: AuditEvent) -> Result<()> {
        match event.severity {
            Severity::Critical | Severity::Error => error!(
                log_type = event.log_type.as_str(),
                action = %event.action,
                project_id = ?event.project_id,
                "audit event"
            ),
            Severity::Warning => warn!(
                log_type = event.log_type.as_str(),
                action = %event.action,
                project_id = ?event.project_id,
                "audit event"
            ),
            Severity::Info => info!(
                log_type = event.log_type.as_str(),
                action = %event.action,
                project_id = ?event.project_id,
                "audit event"
            ),
        }

        self.sender.send(event).await.map_err(|e| {
            crate::errors::AppError::Internal(format!("Failed to queue audit event: {}", e))
        })?;
        Ok(())
    }

    /// Non-async variant for callers outside a task context
    pub fn log_blocking(&self, event: AuditEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| {
            crate::errors::AppError::Internal(format!("Failed to queue audit event: {}", e))
        })?;
        Ok(())
    }
}

/// Background batch processor that accumulates events and writes them in batches
async fn batch_processor(
    mut receiver: mpsc::Receiver<AuditEvent>,
    storage: Arc<dyn AuditStorage>,
    config: AuditLoggerConfig,
) {
    let mut batch: Vec<AuditEvent> = Vec::with_capacity(config.batch_size);
    let mut flush_interval = interval(Duration::from_millis(config.batch_timeout_ms));

    info!(
        "Audit logger batch processor started (batch_size={}, timeout_ms={})",
        config.batch_size, config.batch_timeout_ms
    );

    loop {
        tokio::select! {
            // Receive events from the channel
            Some(event) = receiver.recv() => {
                batch.push(event);

                // Flush if batch is full
                if batch.len() >= config.batch_size {
                    flush_batch(&mut batch, &storage).await;
                }
            }

            // Flush on timeout even if batch is not full
            _ = flush_interval.tick() => {
                if !batch.is_empty() {
                    flush_batch(&mut batch, &storage).await;
                }
            }

            // Channel closed, flush remaining events and exit
            else => {
                warn!("Audit logger channel closed, flushing remaining events");
                if !batch.is_empty() {
                    flush_batch(&mut batch, &storage).await;
                }
                break;
            }
        }
    }

    info!("Audit logger batch processor stopped");
}

/// Flush a batch of events to storage. Failures never propagate: the
/// batch is dropped after being reported locally, because an audit
/// backlog must not wedge the channel and stall callers.
async fn flush_batch(batch: &mut Vec<AuditEvent>, storage: &Arc<dyn AuditStorage>) {
    if batch.is_empty() {
        return;
    }

    let count = batch.len();
    let start = std::time::Instant::now();

    let persisted_events: Vec<PersistedAuditEvent> = batch
        .drain(..)
        .map(|event| PersistedAuditEvent {
            id: Uuid::new_v4(),
            event,
        })
        .collect();

    match storage.write_batch(persisted_events).await {
        Ok(()) => {
            metrics::record_audit_events_written(count);
            tracing::debug!(
                "Flushed {} audit events to storage in {:?}",
                count,
                start.elapsed()
            );
        }
        Err(e) => {
            metrics::record_audit_flush_failure();
            error!(
                "Failed to flush audit batch of {} events: {:?}",
                count, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::storage::InMemoryAuditStorage;
    use crate::domain::audit::LogType;

    fn test_event(action: &str) -> AuditEvent {
        AuditEvent::new(LogType::BackgroundJob, Severity::Info, action)
    }

    #[tokio::test]
    async fn test_batching_flushes_at_size() {
        let storage = Arc::new(InMemoryAuditStorage::new());
        let config = AuditLoggerConfig {
            batch_size: 5,
            batch_timeout_ms: 10_000,
            channel_buffer_size: 100,
        };

        let logger = AuditLogger::new(storage.clone(), config);

        for i in 0..3 {
            logger.log(test_event(&format!("action_{}", i))).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            storage.get_events().await.len(),
            0,
            "Events should not be flushed before the batch fills"
        );

        for i in 3..5 {
            logger.log(test_event(&format!("action_{}", i))).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(storage.get_events().await.len(), 5);
    }

    #[tokio::test]
    async fn test_timeout_flush() {
        let storage = Arc::new(InMemoryAuditStorage::new());
        let config = AuditLoggerConfig {
            batch_size: 100,
            batch_timeout_ms: 100,
            channel_buffer_size: 100,
        };

        let logger = AuditLogger::new(storage.clone(), config);

        logger.log(test_event("one")).await.unwrap();
        logger.log(test_event("two")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(storage.get_events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_logging() {
        let storage = Arc::new(InMemoryAuditStorage::failing());
        let config = AuditLoggerConfig {
            batch_size: 1,
            batch_timeout_ms: 50,
            channel_buffer_size: 100,
        };

        let logger = AuditLogger::new(storage.clone(), config);

        // Every flush fails; the logger must keep accepting events
        for i in 0..10 {
            logger.log(test_event(&format!("action_{}", i))).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(storage.get_events().await.len(), 0);
        assert!(logger.log(test_event("still_accepting")).await.is_ok());
    }
}
