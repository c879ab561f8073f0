// ── Reactive subscriptions ──
//
// Subscription handles vended by the DataStore for consuming snapshot
// changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to a reactive collection.
///
/// Offers point-in-time snapshot access plus change notification via
/// [`changed`](Self::changed), or conversion into a `Stream`.
pub struct Subscription<T: Send + Sync + 'static> {
    current: Arc<Vec<Arc<T>>>,
    receiver: watch::Receiver<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<T>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<Vec<Arc<T>>> {
        &self.current
    }

    /// The latest snapshot (may be newer than `current`).
    pub fn latest(&self) -> Arc<Vec<Arc<T>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return the new snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Arc<T>>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SubscriptionStream<T> {
        SubscriptionStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`; yields a fresh
/// snapshot on every store mutation.
pub struct SubscriptionStream<T: Send + Sync + 'static> {
    inner: WatchStream<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> Stream for SubscriptionStream<T> {
    type Item = Arc<Vec<Arc<T>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Arc<Vec<Arc<T>>> is Unpin, so WatchStream is too.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
