use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit event builder for creating audit log entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub log_type: LogType,
    pub severity: Severity,
    pub project_id: Option<Uuid>,
    pub developer_id: Option<Uuid>,
    pub action: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(log_type: LogType, severity: Severity, action: impl Into<String>) -> Self {
        Self {
            log_type,
            severity,
            project_id: None,
            developer_id: None,
            action: action.into(),
            details: serde_json::json!({}),
            ip_address: None,
            user_agent: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_developer(mut self, developer_id: Uuid) -> Self {
        self.developer_id = Some(developer_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_context(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }
}

/// Audit log entry types for categorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Suspension,
    Unsuspension,
    AuthFailure,
    RateLimitExceeded,
    ValidationFailure,
    BackgroundJob,
    ManualIntervention,
    FeatureFlagEnabled,
    FeatureFlagDisabled,
}

impl LogType {
    pub fn as_str(&self) -> &str {
        match self {
            LogType::Suspension => "suspension",
            LogType::Unsuspension => "unsuspension",
            LogType::AuthFailure => "auth_failure",
            LogType::RateLimitExceeded => "rate_limit_exceeded",
            LogType::ValidationFailure => "validation_failure",
            LogType::BackgroundJob => "background_job",
            LogType::ManualIntervention => "manual_intervention",
            LogType::FeatureFlagEnabled => "feature_flag.enabled",
            LogType::FeatureFlagDisabled => "feature_flag.disabled",
        }
    }
}

/// Severity of an audit entry; routes to diagnostic channels in
/// addition to the durable store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// Audit event with its storage identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAuditEvent {
    pub id: Uuid,
    pub event: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_carries_context() {
        let project = Uuid::new_v4();
        let event = AuditEvent::new(LogType::Suspension, Severity::Critical, "auto_suspend")
            .with_project(project)
            .with_context(Some("203.0.113.9".to_string()), None)
            .with_details(serde_json::json!({"cap_type": "db_queries_per_day"}));

        assert_eq!(event.project_id, Some(project));
        assert_eq!(event.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(event.details["cap_type"], "db_queries_per_day");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_log_type_wire_names() {
        assert_eq!(LogType::AuthFailure.as_str(), "auth_failure");
        assert_eq!(LogType::FeatureFlagEnabled.as_str(), "feature_flag.enabled");
        assert_eq!(LogType::ManualIntervention.as_str(), "manual_intervention");
    }
}
