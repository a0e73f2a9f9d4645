use serde::{Deserialize, Serialize};

/// Service-availability state of a project. Owned by the platform's
/// project lifecycle; this crate only flips it on suspension and
/// resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Suspended,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Suspended => "suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProjectStatus::Active),
            "suspended" => Some(ProjectStatus::Suspended),
            _ => None,
        }
    }
}

/// Data-access level attached to a project.
/// Suspension is authoritative over rate limiting: a read-only or
/// blocked project rejects write-class usage regardless of limiter
/// outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataAccess {
    Full,
    ReadOnly,
    Blocked,
}

impl DataAccess {
    pub fn as_str(&self) -> &str {
        match self {
            DataAccess::Full => "full",
            DataAccess::ReadOnly => "read_only",
            DataAccess::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(DataAccess::Full),
            "read_only" => Some(DataAccess::ReadOnly),
            "blocked" => Some(DataAccess::Blocked),
            _ => None,
        }
    }

    pub fn allows_writes(&self) -> bool {
        matches!(self, DataAccess::Full)
    }

    pub fn allows_reads(&self) -> bool {
        !matches!(self, DataAccess::Blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_rejects_writes() {
        assert!(DataAccess::Full.allows_writes());
        assert!(!DataAccess::ReadOnly.allows_writes());
        assert!(!DataAccess::Blocked.allows_writes());
        assert!(DataAccess::ReadOnly.allows_reads());
        assert!(!DataAccess::Blocked.allows_reads());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            ProjectStatus::from_str(ProjectStatus::Suspended.as_str()),
            Some(ProjectStatus::Suspended)
        );
        assert_eq!(ProjectStatus::from_str("archived"), None);
    }
}
