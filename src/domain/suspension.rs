use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Why a project was suspended; stored alongside the record so the
/// caller can self-diagnose the violated cap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuspensionReason {
    pub cap_type: String,
    pub current_value: i64,
    pub limit_exceeded: i64,
    pub details: String,
}

/// A punitive suspension of a project.
/// At most one unresolved record (resolved_at IS NULL) may exist per
/// project; the store enforces this with a partial unique index.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SuspensionRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reason: Json<SuspensionReason>,
    pub cap_exceeded: bool,
    pub suspended_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl SuspensionRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}
