// ── User domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Operator role. Authoritative from the backend — the client never
/// computes or upgrades it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    User,
    Support,
    Admin,
    Master,
}

impl Role {
    /// Elevated roles see master data and may manage accounts and grants.
    pub fn elevated(self) -> bool {
        matches!(self, Self::Admin | Self::Master)
    }
}

/// A dashboard account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl User {
    /// Display name: full name when present, username otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn role_parses_backend_strings() {
        assert_eq!(Role::from_str("master").unwrap(), Role::Master);
        assert_eq!(Role::from_str("Support").unwrap(), Role::Support);
        assert!(Role::from_str("root").is_err());
    }

    #[test]
    fn role_displays_lowercase() {
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn only_admin_and_master_are_elevated() {
        assert!(!Role::User.elevated());
        assert!(!Role::Support.elevated());
        assert!(Role::Admin.elevated());
        assert!(Role::Master.elevated());
    }
}
