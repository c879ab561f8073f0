// ── Message domain types ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry message. Immutable after ingestion except for
/// `device_name`, a denormalized projection of the owning device's
/// current name. Identity key: `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    /// Electronic Serial Number of the sending device — the grouping key.
    pub esn: String,
    pub device_name: Option<String>,
    /// Opaque payload, as transmitted.
    pub payload: String,
    pub received_at: DateTime<Utc>,
    /// Usernames that can also see this device's messages.
    pub shared_with: Vec<String>,
}

/// All messages sharing an `esn`, derived on demand — never stored.
///
/// `device_name` is the most recently known name for the group, even when
/// older messages still carry a stale one. Messages keep store order
/// (newest first).
#[derive(Debug, Clone)]
pub struct DeviceGroup {
    pub esn: String,
    pub device_name: Option<String>,
    pub shared_with: Vec<String>,
    pub messages: Vec<Arc<Message>>,
}

impl DeviceGroup {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The newest message in the group, if any.
    pub fn latest(&self) -> Option<&Arc<Message>> {
        self.messages.first()
    }

    /// Case-insensitive match against name or ESN (the monitor search box).
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.esn.to_lowercase().contains(&query)
            || self
                .device_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&query))
    }
}
