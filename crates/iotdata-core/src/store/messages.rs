// ── Message working set ──
//
// The ordered message log behind the monitor view. Polling replaces the
// whole set; push delivery prepends single messages; renames rewrite the
// denormalized device_name. Grouping by ESN is derived on demand, never
// stored.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{DeviceGroup, Message};
use crate::stream::Subscription;

/// Reactive, ordered message store.
///
/// The working set lives inside a `watch` channel; every mutation swaps
/// in a freshly built `Arc<Vec<_>>`, so readers always observe a
/// complete, consistent snapshot and subscribers are notified push-style.
pub struct MessageLog {
    snapshot: watch::Sender<Arc<Vec<Arc<Message>>>>,

    /// Synthetic ids for live messages the backend broadcast before
    /// assigning a row id. Counts down from `u64::MAX` so they can never
    /// collide with backend auto-increment ids.
    next_local_id: AtomicU64,
}

impl MessageLog {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            snapshot,
            next_local_id: AtomicU64::new(u64::MAX),
        }
    }

    /// Allocate an id for a live message that arrived without one.
    pub(crate) fn allocate_local_id(&self) -> u64 {
        self.next_local_id.fetch_sub(1, Ordering::Relaxed)
    }

    /// Replace the working set with a full authoritative snapshot.
    ///
    /// Duplicate ids within the snapshot collapse to the first
    /// occurrence, so ingesting the same snapshot twice yields an
    /// identical view. Incoming order is preserved (the backend returns
    /// newest first).
    pub(crate) fn ingest(&self, messages: Vec<Message>) {
        let mut seen: HashSet<u64> = HashSet::with_capacity(messages.len());
        let deduped: Vec<Arc<Message>> = messages
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .map(Arc::new)
            .collect();
        self.snapshot.send_modify(|snap| *snap = Arc::new(deduped));
    }

    /// Insert one live message at the head of the working set.
    ///
    /// A duplicate id is ignored — the poll snapshot may already have
    /// delivered the same message.
    pub(crate) fn prepend(&self, message: Message) {
        self.snapshot.send_modify(|snap| {
            if snap.iter().any(|m| m.id == message.id) {
                return;
            }
            let mut next = Vec::with_capacity(snap.len() + 1);
            next.push(Arc::new(message));
            next.extend(snap.iter().cloned());
            *snap = Arc::new(next);
        });
    }

    /// Rewrite the denormalized `device_name` on every message with this
    /// ESN. Other fields are untouched.
    pub(crate) fn apply_rename(&self, esn: &str, name: Option<&str>) {
        self.snapshot.send_modify(|snap| {
            if !snap.iter().any(|m| m.esn == esn) {
                return;
            }
            let next: Vec<Arc<Message>> = snap
                .iter()
                .map(|m| {
                    if m.esn == esn {
                        let mut renamed = (**m).clone();
                        renamed.device_name = name.map(str::to_owned);
                        Arc::new(renamed)
                    } else {
                        Arc::clone(m)
                    }
                })
                .collect();
            *snap = Arc::new(next);
        });
    }

    /// Drop every message.
    pub(crate) fn clear(&self) {
        self.snapshot.send_modify(|snap| *snap = Arc::new(Vec::new()));
    }

    /// Current working set (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Message>>> {
        self.snapshot.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }

    /// Subscribe to working-set changes.
    pub fn subscribe(&self) -> Subscription<Message> {
        Subscription::new(self.snapshot.subscribe())
    }

    /// Partition the working set into device groups, keyed by ESN in
    /// first-seen order. The union of all groups is exactly the working
    /// set; nothing is dropped or duplicated.
    pub fn grouped(&self) -> Vec<DeviceGroup> {
        let snap = self.snapshot();
        let mut groups: IndexMap<&str, DeviceGroup> = IndexMap::new();

        for message in snap.iter() {
            let group = groups
                .entry(message.esn.as_str())
                .or_insert_with(|| DeviceGroup {
                    esn: message.esn.clone(),
                    device_name: None,
                    shared_with: Vec::new(),
                    messages: Vec::new(),
                });
            // The newest message carries the current name and share list.
            if group.messages.is_empty() {
                group.shared_with = message.shared_with.clone();
            }
            if group.device_name.is_none() {
                group.device_name = message.device_name.clone();
            }
            group.messages.push(Arc::clone(message));
        }

        groups.into_values().collect()
    }

    /// The group for one ESN, if any messages exist for it.
    pub fn group(&self, esn: &str) -> Option<DeviceGroup> {
        self.grouped().into_iter().find(|g| g.esn == esn)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn msg(id: u64, esn: &str, payload: &str, name: Option<&str>) -> Message {
        Message {
            id,
            esn: esn.to_owned(),
            device_name: name.map(str::to_owned),
            payload: payload.to_owned(),
            received_at: DateTime::<Utc>::UNIX_EPOCH,
            shared_with: Vec::new(),
        }
    }

    fn ids(log: &MessageLog) -> Vec<u64> {
        log.snapshot().iter().map(|m| m.id).collect()
    }

    #[test]
    fn ingest_replaces_not_appends() {
        let log = MessageLog::new();
        log.ingest(vec![msg(1, "A", "x", None), msg(2, "B", "y", None)]);
        log.ingest(vec![msg(3, "A", "z", None)]);

        assert_eq!(ids(&log), vec![3]);
    }

    #[test]
    fn ingest_is_idempotent() {
        let log = MessageLog::new();
        let snapshot = vec![msg(2, "A", "x", None), msg(1, "B", "y", None)];

        log.ingest(snapshot.clone());
        let first: Vec<u64> = ids(&log);
        log.ingest(snapshot);
        assert_eq!(ids(&log), first);
    }

    #[test]
    fn ingest_collapses_duplicate_ids() {
        let log = MessageLog::new();
        log.ingest(vec![
            msg(1, "A", "first", None),
            msg(1, "A", "second", None),
            msg(2, "A", "other", None),
        ]);

        assert_eq!(ids(&log), vec![1, 2]);
        assert_eq!(log.snapshot()[0].payload, "first");
    }

    #[test]
    fn prepend_goes_to_head_and_dedups() {
        let log = MessageLog::new();
        log.ingest(vec![msg(1, "A", "x", None)]);
        log.prepend(msg(2, "A", "y", None));
        log.prepend(msg(2, "A", "y-again", None));

        assert_eq!(ids(&log), vec![2, 1]);
    }

    #[test]
    fn grouping_partitions_without_loss() {
        let log = MessageLog::new();
        log.ingest(vec![
            msg(5, "A", "a1", None),
            msg(4, "B", "b1", None),
            msg(3, "A", "a2", None),
            msg(2, "C", "c1", None),
            msg(1, "B", "b2", None),
        ]);

        let groups = log.grouped();
        assert_eq!(groups.len(), 3);

        // First-seen order
        let esns: Vec<&str> = groups.iter().map(|g| g.esn.as_str()).collect();
        assert_eq!(esns, vec!["A", "B", "C"]);

        // Union recovers the original set exactly, by id
        let mut recovered: Vec<u64> = groups
            .iter()
            .flat_map(|g| g.messages.iter().map(|m| m.id))
            .collect();
        recovered.sort_unstable();
        assert_eq!(recovered, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn group_order_follows_store_order() {
        let log = MessageLog::new();
        log.prepend(msg(1, "E1", "AA", None));
        log.prepend(msg(2, "E1", "BB", None));

        let group = log.group("E1").unwrap();
        let payloads: Vec<&str> = group.messages.iter().map(|m| m.payload.as_str()).collect();
        // B arrived after A, so B is newest-first — A precedes B in history
        assert_eq!(payloads, vec!["BB", "AA"]);
    }

    #[test]
    fn group_name_is_most_recent_known() {
        let log = MessageLog::new();
        log.ingest(vec![
            msg(2, "A", "new", Some("Tractor1")),
            msg(1, "A", "old", Some("OldName")),
        ]);

        let group = log.group("A").unwrap();
        assert_eq!(group.device_name.as_deref(), Some("Tractor1"));
    }

    #[test]
    fn rename_rewrites_only_matching_esn() {
        let log = MessageLog::new();
        log.ingest(vec![
            msg(2, "A", "x", Some("Old")),
            msg(1, "B", "y", Some("Other")),
        ]);

        log.apply_rename("A", Some("New"));

        let snap = log.snapshot();
        assert_eq!(snap[0].device_name.as_deref(), Some("New"));
        assert_eq!(snap[1].device_name.as_deref(), Some("Other"));
    }

    #[test]
    fn local_ids_never_collide_with_backend_ids() {
        let log = MessageLog::new();
        let a = log.allocate_local_id();
        let b = log.allocate_local_id();
        assert_ne!(a, b);
        assert!(a > 1_000_000_000);
    }

    #[test]
    fn subscription_sees_prepend() {
        let log = MessageLog::new();
        let sub = log.subscribe();
        assert!(sub.current().is_empty());

        log.prepend(msg(1, "A", "x", None));
        assert_eq!(sub.latest().len(), 1);
    }
}
