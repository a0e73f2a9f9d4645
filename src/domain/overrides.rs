use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Operator actions available through the override path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    Suspend,
    Unsuspend,
    AdjustCaps,
}

impl OverrideAction {
    pub fn as_str(&self) -> &str {
        match self {
            OverrideAction::Suspend => "suspend",
            OverrideAction::Unsuspend => "unsuspend",
            OverrideAction::AdjustCaps => "adjust_caps",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "suspend" => Some(OverrideAction::Suspend),
            "unsuspend" => Some(OverrideAction::Unsuspend),
            "adjust_caps" => Some(OverrideAction::AdjustCaps),
            _ => None,
        }
    }
}

/// Immutable record of a manual operator intervention.
/// Previous and new state are both captured even when unchanged so the
/// record reads as a complete diff.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ManualOverride {
    pub id: Uuid,
    pub project_id: Uuid,
    pub action: String,
    pub reason: String,
    pub notes: Option<String>,
    pub previous_status: String,
    pub new_status: String,
    pub previous_caps: serde_json::Value,
    pub new_caps: serde_json::Value,
    pub performed_by: Uuid,
    pub performed_at: DateTime<Utc>,
}

/// Aggregate view returned by the statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideStatistics {
    pub total: i64,
    pub suspends: i64,
    pub unsuspends: i64,
    pub cap_adjustments: i64,
    pub last_24h: i64,
    pub last_7d: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        for action in [
            OverrideAction::Suspend,
            OverrideAction::Unsuspend,
            OverrideAction::AdjustCaps,
        ] {
            assert_eq!(OverrideAction::from_str(action.as_str()), Some(action));
        }
        assert_eq!(OverrideAction::from_str("delete"), None);
    }
}
