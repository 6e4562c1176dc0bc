use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::events::{SessionChange, SessionEvents, SessionHandler, Subscription};

/// Claims
///
/// Payload of the session credential issued by the sign-in flow.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal id, also the primary key of the profile record.
    pub sub: Uuid,
    /// Expiration time (seconds since the epoch).
    pub exp: usize,
    /// Issued at (seconds since the epoch). Compared against sign-out cutoffs.
    pub iat: usize,
}

/// Principal
///
/// The authenticated actor behind a credential. Only exists while the
/// identity provider still considers the credential valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub issued_at: usize,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("sign-out rejected for principal {0}")]
    SignOutRejected(Uuid),
}

/// IdentityProvider
///
/// Contract for the external authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a credential to the principal it represents, or `None` when the
    /// credential is malformed, expired or was issued before a sign-out.
    fn current_principal(&self, credential: &str) -> Option<Principal>;

    /// Reads the principal id from a credential whose signature verifies,
    /// ignoring expiry and revocation. Only used to route a signed-out
    /// browser to its pending redirect; never grants access.
    fn subject(&self, _credential: &str) -> Option<Uuid> {
        None
    }

    /// Revokes every credential the principal currently holds.
    async fn sign_out(&self, principal_id: Uuid) -> Result<(), IdentityError>;

    /// Registers an auth-state observer. The handler stays registered until
    /// the returned subscription is dropped.
    fn on_session_change(&self, handler: SessionHandler) -> Subscription;
}

pub type IdentityState = Arc<dyn IdentityProvider>;

/// Upper bound on `exp - iat` for accepted credentials.
pub const DEFAULT_MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Default)]
struct SessionBook {
    // Principals seen since their last sign-out, with the latest expiry seen.
    active: HashMap<Uuid, usize>,
    // Credentials issued at or before this instant are revoked.
    signed_out_at: HashMap<Uuid, usize>,
}

impl SessionBook {
    /// Forgets principals whose credentials have all expired, and cutoffs no
    /// live credential can predate. `horizon` is the longest a credential can
    /// stay acceptable after its `iat`.
    fn prune(&mut self, now: usize, horizon: usize) {
        self.active.retain(|_, exp| *exp > now);
        self.signed_out_at
            .retain(|_, cutoff| cutoff.saturating_add(horizon) >= now);
    }
}

/// JwtIdentityProvider
///
/// Verifies HS256 session credentials and keeps a per-principal revocation
/// cutoff so signing out invalidates outstanding tokens.
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
    subject_validation: Validation,
    max_token_lifetime: usize,
    book: RwLock<SessionBook>,
    events: SessionEvents,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let mut subject_validation = Validation::default();
        subject_validation.validate_exp = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            subject_validation,
            max_token_lifetime: DEFAULT_MAX_TOKEN_LIFETIME.as_secs() as usize,
            book: RwLock::new(SessionBook::default()),
            events: SessionEvents::new(),
        }
    }

    /// Rejects credentials whose `exp - iat` exceeds `lifetime`.
    pub fn with_max_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_token_lifetime = lifetime.as_secs() as usize;
        self
    }

    /// Principals currently tracked as signed in.
    pub fn active_count(&self) -> usize {
        self.book.read().active.len()
    }

    /// Sign-out cutoffs still retained for revocation checks.
    pub fn revocation_count(&self) -> usize {
        self.book.read().signed_out_at.len()
    }

    fn horizon(&self) -> usize {
        self.max_token_lifetime
            .saturating_add(self.validation.leeway as usize)
    }

    fn now_secs() -> usize {
        chrono::Utc::now().timestamp().max(0) as usize
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    fn current_principal(&self, credential: &str) -> Option<Principal> {
        let claims = match decode::<Claims>(credential, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("credential expired"),
                    other => tracing::debug!("credential rejected: {:?}", other),
                }
                return None;
            }
        };

        if claims.exp.saturating_sub(claims.iat) > self.max_token_lifetime {
            tracing::debug!(principal = %claims.sub, "credential lifetime exceeds the maximum");
            return None;
        }

        let principal = Principal {
            id: claims.sub,
            issued_at: claims.iat,
        };

        let newly_seen = {
            let mut book = self.book.write();
            if let Some(cutoff) = book.signed_out_at.get(&principal.id) {
                if principal.issued_at <= *cutoff {
                    tracing::debug!(principal = %principal.id, "credential issued before sign-out");
                    return None;
                }
            }
            match book.active.get_mut(&principal.id) {
                Some(exp) => {
                    *exp = (*exp).max(claims.exp);
                    false
                }
                None => {
                    book.prune(Self::now_secs(), self.horizon());
                    book.active.insert(principal.id, claims.exp);
                    true
                }
            }
        };

        if newly_seen {
            self.events.publish(&SessionChange::SignedIn(principal.clone()));
        }

        Some(principal)
    }

    async fn sign_out(&self, principal_id: Uuid) -> Result<(), IdentityError> {
        {
            let now = Self::now_secs();
            let mut book = self.book.write();
            book.active.remove(&principal_id);
            book.prune(now, self.horizon());
            book.signed_out_at.insert(principal_id, now);
        }
        tracing::info!(principal = %principal_id, "principal signed out");
        self.events.publish(&SessionChange::SignedOut(principal_id));
        Ok(())
    }

    fn subject(&self, credential: &str) -> Option<Uuid> {
        decode::<Claims>(credential, &self.decoding_key, &self.subject_validation)
            .ok()
            .map(|data| data.claims.sub)
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.events.subscribe(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_drops_expired_principals_and_stale_cutoffs() {
        let (kept, dropped) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = SessionBook::default();
        book.active.insert(kept, 2_000);
        book.active.insert(dropped, 999);
        book.signed_out_at.insert(kept, 500);
        book.signed_out_at.insert(dropped, 400);

        book.prune(1_000, 500);

        assert!(book.active.contains_key(&kept));
        assert!(!book.active.contains_key(&dropped));
        assert!(book.signed_out_at.contains_key(&kept));
        assert!(!book.signed_out_at.contains_key(&dropped));
    }
}
