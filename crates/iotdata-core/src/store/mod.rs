// ── Central reactive data store ──
//
// Thread-safe storage for the message working set and the device/user
// caches. Mutations are whole-slice swaps broadcast to subscribers via
// `watch` channels — producers never patch records in place, which is
// what keeps a rename commit and a concurrent poll from losing updates.

mod collection;
mod messages;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{Device, DeviceGroup, Message, User};
use crate::stream::Subscription;
use collection::Collection;
pub use messages::MessageLog;

/// Central reactive store for the dashboard session.
pub struct DataStore {
    pub(crate) messages: MessageLog,
    /// Device cache, keyed by ESN. Populated only for elevated roles.
    pub(crate) devices: Collection<Device>,
    /// User cache, keyed by username. Populated only for elevated roles.
    pub(crate) users: Collection<User>,
    pub(crate) last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_refresh, _) = watch::channel(None);
        Self {
            messages: MessageLog::new(),
            devices: Collection::new(),
            users: Collection::new(),
            last_refresh,
        }
    }

    // ── Messages ─────────────────────────────────────────────────────

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn messages_snapshot(&self) -> Arc<Vec<Arc<Message>>> {
        self.messages.snapshot()
    }

    /// All device groups, derived from the current working set.
    pub fn groups(&self) -> Vec<DeviceGroup> {
        self.messages.grouped()
    }

    /// The group for one ESN, if present.
    pub fn group(&self, esn: &str) -> Option<DeviceGroup> {
        self.messages.group(esn)
    }

    pub fn subscribe_messages(&self) -> Subscription<Message> {
        self.messages.subscribe()
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn device_by_esn(&self, esn: &str) -> Option<Arc<Device>> {
        self.devices.get(esn)
    }

    pub fn device_by_id(&self, id: u64) -> Option<Arc<Device>> {
        self.devices_snapshot().iter().find(|d| d.id == id).cloned()
    }

    pub fn subscribe_devices(&self) -> Subscription<Device> {
        Subscription::new(self.devices.subscribe())
    }

    // ── Users ────────────────────────────────────────────────────────

    pub fn users_snapshot(&self) -> Arc<Vec<Arc<User>>> {
        self.users.snapshot()
    }

    pub fn user_by_username(&self, username: &str) -> Option<Arc<User>> {
        self.users.get(username)
    }

    pub fn user_by_id(&self, id: u64) -> Option<Arc<User>> {
        self.users_snapshot().iter().find(|u| u.id == id).cloned()
    }

    pub fn subscribe_users(&self) -> Subscription<User> {
        Subscription::new(self.users.subscribe())
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // ── Metadata / lifecycle ─────────────────────────────────────────

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// How long ago the last poll landed, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().map(|t| Utc::now() - t)
    }

    /// Drop everything. Called when the session is invalidated (401) or
    /// torn down — local session state must not survive.
    pub fn clear(&self) {
        self.messages.clear();
        self.devices.clear();
        self.users.clear();
        let _ = self.last_refresh.send(None);
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
