use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Cap types
// ============================================================================

/// The billable dimensions a project cap can be set on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CapType {
    DbQueriesPerDay,
    RealtimeConnections,
    StorageUploadsPerDay,
    FunctionInvocationsPerDay,
}

impl CapType {
    pub fn as_str(&self) -> &str {
        match self {
            CapType::DbQueriesPerDay => "db_queries_per_day",
            CapType::RealtimeConnections => "realtime_connections",
            CapType::StorageUploadsPerDay => "storage_uploads_per_day",
            CapType::FunctionInvocationsPerDay => "function_invocations_per_day",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "db_queries_per_day" => Some(CapType::DbQueriesPerDay),
            "realtime_connections" => Some(CapType::RealtimeConnections),
            "storage_uploads_per_day" => Some(CapType::StorageUploadsPerDay),
            "function_invocations_per_day" => Some(CapType::FunctionInvocationsPerDay),
            _ => None,
        }
    }

    /// Whether usage on this dimension counts as write-class work,
    /// rejected outright while a project is read-only
    pub fn is_write_class(&self) -> bool {
        matches!(
            self,
            CapType::StorageUploadsPerDay | CapType::FunctionInvocationsPerDay
        )
    }
}

// ============================================================================
// Project cap
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectCap {
    pub project_id: Uuid,
    pub cap_type: String,
    pub limit_value: i64,
    /// Breaching a hard cap suspends the project; a soft cap only warns
    pub hard_cap: bool,
}

impl ProjectCap {
    pub fn cap_type(&self) -> Option<CapType> {
        CapType::from_str(&self.cap_type)
    }
}

// ============================================================================
// Usage sample
// ============================================================================

/// Append-only usage fact recorded by the request-serving paths
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageSample {
    pub project_id: Uuid,
    pub cap_type: String,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

// ============================================================================
// Quota status banding
// ============================================================================

/// Status bands shared by the quota-read API and the spike detector's
/// early-warning notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum QuotaStatus {
    Ok,
    Warning,
    Critical,
    Exceeded,
}

impl QuotaStatus {
    pub fn as_str(&self) -> &str {
        match self {
            QuotaStatus::Ok => "ok",
            QuotaStatus::Warning => "warning",
            QuotaStatus::Critical => "critical",
            QuotaStatus::Exceeded => "exceeded",
        }
    }
}

/// Band a usage figure against its limit.
/// Returns the percentage used and the resulting band.
pub fn calculate_status(used: i64, limit: i64) -> (f64, QuotaStatus) {
    let percentage = if limit > 0 {
        used as f64 / limit as f64 * 100.0
    } else {
        0.0
    };

    let status = if percentage >= 100.0 {
        QuotaStatus::Exceeded
    } else if percentage >= 90.0 {
        QuotaStatus::Critical
    } else if percentage >= 80.0 {
        QuotaStatus::Warning
    } else {
        QuotaStatus::Ok
    };

    (percentage, status)
}

/// Point-in-time view of one cap for the quota-read API
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub cap_type: String,
    pub used: i64,
    pub limit: i64,
    pub percentage: f64,
    pub status: QuotaStatus,
    pub hard_cap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bands() {
        assert_eq!(calculate_status(0, 1000).1, QuotaStatus::Ok);
        assert_eq!(calculate_status(799, 1000).1, QuotaStatus::Ok);
        assert_eq!(calculate_status(800, 1000).1, QuotaStatus::Warning);
        assert_eq!(calculate_status(899, 1000).1, QuotaStatus::Warning);
        assert_eq!(calculate_status(900, 1000).1, QuotaStatus::Critical);
        assert_eq!(calculate_status(999, 1000).1, QuotaStatus::Critical);
        assert_eq!(calculate_status(1000, 1000).1, QuotaStatus::Exceeded);
        assert_eq!(calculate_status(55_000, 10_000).1, QuotaStatus::Exceeded);
    }

    #[test]
    fn test_zero_limit_is_zero_percent() {
        let (pct, status) = calculate_status(500, 0);
        assert_eq!(pct, 0.0);
        assert_eq!(status, QuotaStatus::Ok);
    }

    #[test]
    fn test_percentage_math() {
        let (pct, _) = calculate_status(250, 1000);
        assert!((pct - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cap_type_round_trip() {
        for cap in [
            CapType::DbQueriesPerDay,
            CapType::RealtimeConnections,
            CapType::StorageUploadsPerDay,
            CapType::FunctionInvocationsPerDay,
        ] {
            assert_eq!(CapType::from_str(cap.as_str()), Some(cap));
        }
        assert_eq!(CapType::from_str("bandwidth_per_day"), None);
    }
}
