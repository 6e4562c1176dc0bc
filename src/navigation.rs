use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::Instant;
use uuid::Uuid;

/// Navigator
///
/// Sink for forced full-page navigations issued outside a request, such as
/// an idle timeout firing on a background task.
pub trait Navigator: Send + Sync {
    fn redirect(&self, principal_id: Uuid, url: &str);
}

pub type NavigatorState = Arc<dyn Navigator>;

/// How long an unclaimed redirect is kept before it is dropped.
pub const DEFAULT_REDIRECT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

struct Queued {
    url: String,
    queued_at: Instant,
}

#[derive(Default)]
struct Pending {
    by_principal: HashMap<Uuid, Queued>,
    // Local session ids cleared by a sign-out, pointing at their principal.
    by_session: HashMap<Uuid, Uuid>,
}

impl Pending {
    fn remove(&mut self, principal_id: Uuid) -> Option<String> {
        let queued = self.by_principal.remove(&principal_id)?;
        self.by_session.retain(|_, owner| *owner != principal_id);
        Some(queued.url)
    }
}

/// RedirectQueue
///
/// Remembers the pending navigation per principal. The next guarded request
/// or activity report from that principal is answered with the redirect,
/// which is consumed in the process. A browser whose credential was revoked
/// still reaches it through the credential subject or a bound session id.
pub struct RedirectQueue {
    retention: Duration,
    pending: RwLock<Pending>,
}

impl Default for RedirectQueue {
    fn default() -> Self {
        Self::with_retention(DEFAULT_REDIRECT_RETENTION)
    }
}

impl RedirectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            pending: RwLock::new(Pending::default()),
        }
    }

    pub fn take(&self, principal_id: Uuid) -> Option<String> {
        self.pending.write().remove(principal_id)
    }

    /// Consumes the redirect pending for the principal a local session
    /// belonged to.
    pub fn take_for_session(&self, session_id: Uuid) -> Option<String> {
        let mut pending = self.pending.write();
        let principal_id = pending.by_session.remove(&session_id)?;
        pending.remove(principal_id)
    }

    /// Lets the given local session ids claim the principal's pending
    /// redirect. No-op when nothing is pending.
    pub fn bind_sessions(&self, principal_id: Uuid, session_ids: &[Uuid]) {
        let mut pending = self.pending.write();
        if !pending.by_principal.contains_key(&principal_id) {
            return;
        }
        for session_id in session_ids {
            pending.by_session.insert(*session_id, principal_id);
        }
    }

    pub fn is_pending(&self, principal_id: Uuid) -> bool {
        self.pending.read().by_principal.contains_key(&principal_id)
    }

    pub fn len(&self) -> usize {
        self.pending.read().by_principal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Navigator for RedirectQueue {
    fn redirect(&self, principal_id: Uuid, url: &str) {
        tracing::info!(principal = %principal_id, url, "queued forced redirect");
        let now = Instant::now();
        let mut pending = self.pending.write();

        let retention = self.retention;
        pending
            .by_principal
            .retain(|_, queued| now.duration_since(queued.queued_at) < retention);
        let Pending {
            by_principal,
            by_session,
        } = &mut *pending;
        by_session.retain(|_, owner| by_principal.contains_key(owner));

        pending.by_principal.insert(
            principal_id,
            Queued {
                url: url.to_string(),
                queued_at: now,
            },
        );
    }
}
