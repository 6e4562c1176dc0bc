//! Auth-state observers.
//!
//! Consumers register a handler with [`SessionEvents::subscribe`] and keep the
//! returned [`Subscription`] alive for as long as they want to be notified.

use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use uuid::Uuid;

use crate::identity::Principal;

/// An auth-state change published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// A principal was seen for the first time since it last signed out.
    SignedIn(Principal),
    /// The principal's credentials were revoked.
    SignedOut(Uuid),
}

impl SessionChange {
    pub fn principal_id(&self) -> Uuid {
        match self {
            SessionChange::SignedIn(principal) => principal.id,
            SessionChange::SignedOut(id) => *id,
        }
    }
}

pub type SessionHandler = Box<dyn Fn(&SessionChange) + Send + Sync>;

type SharedHandler = Arc<dyn Fn(&SessionChange) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: RwLock<BTreeMap<u64, SharedHandler>>,
}

/// SessionEvents
///
/// Observer registry. Handlers run synchronously on the publishing task, in
/// subscription order, without any registry lock held.
#[derive(Default, Clone)]
pub struct SessionEvents {
    registry: Arc<Registry>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: SessionHandler) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.handlers.write().insert(id, Arc::from(handler));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    pub fn publish(&self, change: &SessionChange) {
        // Snapshot so handlers may subscribe or unsubscribe re-entrantly.
        let handlers: Vec<SharedHandler> =
            self.registry.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(change);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.handlers.read().len()
    }
}

/// Subscription
///
/// Handle returned by `on_session_change`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.handlers.write().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
