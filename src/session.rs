use crate::models::LocalSession;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

/// Cookie carrying the local session id.
pub const LOCAL_SESSION_COOKIE: &str = "sf_session";

/// LocalSessionStore
///
/// Ephemeral key-value store holding `{principal, role, display name}` for
/// pages that authorize locally. Entries are written by the cashier sign-in
/// flow and cleared by the guard on any failed check.
pub trait LocalSessionStore: Send + Sync {
    fn get(&self, id: Uuid) -> Option<LocalSession>;
    /// Stores a session and returns its freshly generated id.
    fn put(&self, session: LocalSession) -> Uuid;
    fn clear(&self, id: Uuid) -> Option<LocalSession>;
    /// Removes every session belonging to the principal; returns their ids.
    fn clear_principal(&self, principal_id: Uuid) -> Vec<Uuid>;
}

pub type LocalSessionState = Arc<dyn LocalSessionStore>;

#[derive(Default)]
pub struct InMemoryLocalSessions {
    sessions: RwLock<HashMap<Uuid, LocalSession>>,
}

impl InMemoryLocalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl LocalSessionStore for InMemoryLocalSessions {
    fn get(&self, id: Uuid) -> Option<LocalSession> {
        self.sessions.read().get(&id).cloned()
    }

    fn put(&self, session: LocalSession) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().insert(id, session);
        id
    }

    fn clear(&self, id: Uuid) -> Option<LocalSession> {
        self.sessions.write().remove(&id)
    }

    fn clear_principal(&self, principal_id: Uuid) -> Vec<Uuid> {
        let mut sessions = self.sessions.write();
        let mut cleared = Vec::new();
        sessions.retain(|id, session| {
            let owned = session.principal_id == principal_id;
            if owned {
                cleared.push(*id);
            }
            !owned
        });
        cleared
    }
}
