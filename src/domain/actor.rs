use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed role enumeration with a total order.
/// Call sites compare roles, never strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Operator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Developer => "developer",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "developer" => Some(Role::Developer),
            "operator" => Some(Role::Operator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// An authenticated caller of the admin surface, with the request
/// context the audit trail records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_context(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_total_order() {
        assert!(Role::Developer < Role::Operator);
        assert!(Role::Operator < Role::Admin);
        assert!(Role::Admin >= Role::Operator);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Developer, Role::Operator, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("superuser"), None);
    }
}
