//! Synchronous snapshot fan-out with per-subscriber isolation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::error;

use crate::portfolio::state::state_model::PortfolioState;

/// Receives the full portfolio snapshot after every committed mutation.
///
/// Callbacks run synchronously on the mutating thread, so a slow subscriber
/// delays the others. A subscriber that returns an error or panics is logged
/// and skipped; it never stops delivery to the rest and never propagates to
/// the mutating caller.
pub trait SnapshotSubscriber: Send + Sync {
    fn on_snapshot(&self, state: &PortfolioState) -> anyhow::Result<()>;

    /// Label used in failure logs.
    fn name(&self) -> &str {
        "subscriber"
    }
}

struct RegisteredSubscriber {
    id: u64,
    subscriber: Arc<dyn SnapshotSubscriber>,
}

/// Ordered list of attached subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<RegisteredSubscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        SubscriberRegistry::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn SnapshotSubscriber>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap()
            .push(RegisteredSubscriber { id, subscriber });
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|entry| entry.id != id);
        subscribers.len() != before
    }

    pub fn count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Delivers a snapshot to every subscriber in subscription order.
    ///
    /// The subscriber list is copied out before delivery, so a callback may
    /// subscribe or unsubscribe reentrantly without deadlocking; such
    /// changes take effect from the next delivery on.
    pub fn notify(&self, state: &PortfolioState) {
        let subscribers: Vec<Arc<dyn SnapshotSubscriber>> = {
            self.subscribers
                .lock()
                .unwrap()
                .iter()
                .map(|entry| entry.subscriber.clone())
                .collect()
        };
        for subscriber in subscribers {
            Self::deliver(subscriber.as_ref(), state);
        }
    }

    /// Delivers to one subscriber, containing errors and panics.
    pub(crate) fn deliver(subscriber: &dyn SnapshotSubscriber, state: &PortfolioState) {
        match catch_unwind(AssertUnwindSafe(|| subscriber.on_snapshot(state))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(
                    "Subscriber '{}' failed to handle snapshot: {}",
                    subscriber.name(),
                    err
                );
            }
            Err(panic) => {
                error!(
                    "Subscriber '{}' panicked while handling snapshot: {}",
                    subscriber.name(),
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

/// Mock subscriber for testing - collects delivered snapshots.
#[derive(Clone, Default)]
pub struct MockSnapshotSubscriber {
    snapshots: Arc<Mutex<Vec<PortfolioState>>>,
}

impl MockSnapshotSubscriber {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns all collected snapshots.
    pub fn snapshots(&self) -> Vec<PortfolioState> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Clears collected snapshots.
    pub fn clear(&self) {
        self.snapshots.lock().unwrap().clear();
    }

    /// Returns the number of collected snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    /// Returns true if no snapshots have been collected.
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().unwrap().is_empty()
    }
}

impl SnapshotSubscriber for MockSnapshotSubscriber {
    fn on_snapshot(&self, state: &PortfolioState) -> anyhow::Result<()> {
        self.snapshots.lock().unwrap().push(state.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Handle returned by `subscribe`. Detaches only on an explicit
/// `unsubscribe` call; dropping the handle leaves the subscriber attached.
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: Weak<SubscriberRegistry>) -> Self {
        Subscription { id, registry }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detaches the subscriber. Returns false when it was already detached
    /// or the registry is gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(self.id),
            None => false,
        }
    }
}

/// Best-effort extraction of a panic payload for logging.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
