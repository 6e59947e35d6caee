//! Single-writer publication point for finished snapshots

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::core::PostureSnapshot;

type Callback = Arc<dyn Fn(Arc<PostureSnapshot>) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// What `current()` returns
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSnapshot {
    /// No cycle has completed yet
    NotYetAvailable,
    Ready(Arc<PostureSnapshot>),
}

impl CurrentSnapshot {
    pub fn ready(self) -> Option<Arc<PostureSnapshot>> {
        match self {
            CurrentSnapshot::Ready(snapshot) => Some(snapshot),
            CurrentSnapshot::NotYetAvailable => None,
        }
    }
}

/// Hands out snapshots to consumers. The current snapshot lives in a
/// `watch` channel; callbacks are delivered once per publish, with no
/// replay for late subscribers.
pub struct SnapshotPublisher {
    current: watch::Sender<Option<Arc<PostureSnapshot>>>,
    subscribers: Mutex<BTreeMap<SubscriptionId, Callback>>,
    next_id: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Make `snapshot` current and deliver it to every subscriber. Returns
    /// `None` once the publisher is closed.
    pub fn publish(&self, snapshot: PostureSnapshot) -> Option<Arc<PostureSnapshot>> {
        if self.is_closed() {
            debug!(sequence = snapshot.sequence, "Publisher closed, dropping snapshot");
            return None;
        }

        let snapshot = Arc::new(snapshot);
        self.current.send_replace(Some(Arc::clone(&snapshot)));
        self.published.fetch_add(1, Ordering::SeqCst);

        for (id, callback) in self.callbacks() {
            let delivered = Arc::clone(&snapshot);
            if catch_unwind(AssertUnwindSafe(|| callback(delivered))).is_err() {
                error!(subscriber = id.0, "Snapshot subscriber panicked");
            }
        }

        Some(snapshot)
    }

    pub fn current(&self) -> CurrentSnapshot {
        match self.current.borrow().as_ref() {
            Some(snapshot) => CurrentSnapshot::Ready(Arc::clone(snapshot)),
            None => CurrentSnapshot::NotYetAvailable,
        }
    }

    /// Receiver that observes every change of the current snapshot
    pub fn watch(&self) -> watch::Receiver<Option<Arc<PostureSnapshot>>> {
        self.current.subscribe()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Arc<PostureSnapshot>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_subscribers().insert(id, Arc::new(callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_subscribers().remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Terminal: later publishes are dropped
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // Callbacks run outside the lock so they may subscribe or unsubscribe
    fn callbacks(&self) -> Vec<(SubscriptionId, Callback)> {
        self.lock_subscribers()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect()
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, BTreeMap<SubscriptionId, Callback>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
