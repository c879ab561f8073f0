// ── Audit trail ──

use serde::{Deserialize, Serialize};

/// One audit-trail entry. Read-only; fetched on demand, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    /// Backend-formatted timestamp, shown as-is.
    pub created_at: String,
    pub username: String,
    pub action: String,
    pub details: String,
    pub ip_address: String,
}

impl AuditEntry {
    /// Case-insensitive match against username, action, or details.
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.username.to_lowercase().contains(&query)
            || self.action.to_lowercase().contains(&query)
            || self.details.to_lowercase().contains(&query)
    }
}
