//! Change notification fan-out to UI subscribers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use terracrypt_types::{ChangeSet, ResourceKind};
use tracing::{error, warn};
use uuid::Uuid;

/// Observer callback. Returning an error is logged and otherwise ignored.
pub type ObserverCallback = Arc<dyn Fn(&ChangeSet) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

struct Subscription {
    id: SubscriptionId,
    kind: ResourceKind,
    callback: ObserverCallback,
}

/// Subscribers per resource kind, notified in registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: ResourceKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        subs.push(Subscription {
            id,
            kind,
            callback: Arc::new(callback),
        });
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self, kind: ResourceKind) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Delivers `changes` to every subscriber of `changes.kind`.
    ///
    /// A subscriber that errors or panics is logged and skipped; the rest
    /// still receive the change set. Callbacks run outside the registry
    /// lock, so they may subscribe or unsubscribe. Returns the number of
    /// callbacks that completed successfully.
    pub fn publish(&self, changes: &ChangeSet) -> usize {
        let callbacks: Vec<(SubscriptionId, ObserverCallback)> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.kind == changes.kind)
            .map(|s| (s.id, Arc::clone(&s.callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(changes))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(kind = %changes.kind, subscription = ?id, error = %e, "observer failed");
                }
                Err(_) => {
                    error!(kind = %changes.kind, subscription = ?id, "observer panicked");
                }
            }
        }
        delivered
    }
}
