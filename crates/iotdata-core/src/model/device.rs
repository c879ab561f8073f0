// ── Device domain type ──

use serde::{Deserialize, Serialize};

/// Client-side cache of a backend device record.
///
/// Refreshed by polling and mutated optimistically on grant / revoke /
/// rename. Mutations always replace the whole record (single assignment
/// swap), never patch fields in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    pub esn: String,
    pub name: Option<String>,
    /// Usernames with granted access.
    pub users: Vec<String>,
}

impl Device {
    /// Whether `username` currently has access to this device.
    pub fn grants(&self, username: &str) -> bool {
        self.users.iter().any(|u| u == username)
    }

    /// A copy with access for `username` added (idempotent).
    pub fn with_grant(&self, username: &str) -> Self {
        let mut next = self.clone();
        if !next.grants(username) {
            next.users.push(username.to_owned());
        }
        next
    }

    /// A copy with access for `username` removed (idempotent).
    pub fn with_revocation(&self, username: &str) -> Self {
        let mut next = self.clone();
        next.users.retain(|u| u != username);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            id: 3,
            esn: "0-4619304".into(),
            name: Some("Tractor1".into()),
            users: vec!["joao".into()],
        }
    }

    #[test]
    fn grant_and_revoke_are_idempotent() {
        let d = device();
        assert!(d.grants("joao"));
        assert!(!d.grants("ana"));

        let granted = d.with_grant("ana").with_grant("ana");
        assert_eq!(granted.users, vec!["joao".to_owned(), "ana".to_owned()]);

        let revoked = granted.with_revocation("joao").with_revocation("joao");
        assert_eq!(revoked.users, vec!["ana".to_owned()]);
    }
}
