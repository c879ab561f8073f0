// ── Generic reactive keyed collection ──
//
// Concurrent keyed storage with deterministic snapshot order and
// push-based change notification via `watch` channels. Backs the device
// and user caches.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection keyed by string (ESN for devices, username for
/// users).
///
/// Snapshots preserve insertion order so derived views (the permission
/// matrix, tables) are deterministic across recomputations. Every
/// mutation rebuilds the snapshot that subscribers receive.
pub(crate) struct Collection<T: Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Key order for snapshots. Upserts of existing keys keep their slot;
    /// `replace_all` adopts the incoming order wholesale.
    order: Mutex<Vec<String>>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> Collection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            order: Mutex::new(Vec::new()),
            snapshot,
        }
    }

    /// Insert or update one entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self
            .by_key
            .insert(key.clone(), Arc::new(entity))
            .is_none();
        if is_new {
            self.order.lock().expect("collection lock poisoned").push(key);
        }
        self.rebuild_snapshot();
        is_new
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.order
                .lock()
                .expect("collection lock poisoned")
                .retain(|k| k != key);
            self.rebuild_snapshot();
        }
        removed
    }

    /// Replace the whole collection with `items`, in their given order.
    ///
    /// Polling returns the full authoritative set each time, so the
    /// incoming list wins: entities not in it are pruned, and the
    /// snapshot order becomes the incoming order. One snapshot rebuild
    /// at the end — subscribers never observe a half-applied refresh.
    pub(crate) fn replace_all(&self, items: Vec<(String, T)>) {
        let incoming: Vec<String> = items.iter().map(|(k, _)| k.clone()).collect();
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
        }
        let stale: Vec<String> = self
            .by_key
            .iter()
            .map(|r| r.key().clone())
            .filter(|k| !incoming.contains(k))
            .collect();
        for key in stale {
            self.by_key.remove(&key);
        }
        *self.order.lock().expect("collection lock poisoned") = incoming;
        self.rebuild_snapshot();
    }

    /// Look up an entity by key.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        self.by_key.clear();
        self.order.lock().expect("collection lock poisoned").clear();
        self.rebuild_snapshot();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Rebuild the ordered snapshot and broadcast it.
    fn rebuild_snapshot(&self) {
        let order = self.order.lock().expect("collection lock poisoned");
        let values: Vec<Arc<T>> = order
            .iter()
            .filter_map(|k| self.by_key.get(k).map(|r| Arc::clone(r.value())))
            .collect();
        drop(order);
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
