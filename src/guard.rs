use uuid::Uuid;

use crate::{
    identity::{IdentityState, Principal},
    models::{LocalSession, Profile, Role},
    repository::ProfileState,
    session::LocalSessionState,
};

/// Why a guard refused a page load. Every reason leads to the same redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    NoPrincipal,
    NoLocalSession,
    LookupFailed,
    ProfileNotFound,
    RoleMismatch { required: Role, found: Role },
}

/// GuardDecision
///
/// Derived per page load, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision<T> {
    Authorized(T),
    Denied(DenialReason),
}

impl<T> GuardDecision<T> {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GuardDecision::Authorized(_))
    }

    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            GuardDecision::Authorized(_) => None,
            GuardDecision::Denied(reason) => Some(reason),
        }
    }
}

/// The resolved identity of a backend-verified page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub principal: Principal,
    pub profile: Profile,
}

/// RoleGuard
///
/// Backend-verified guard: principal from the identity provider, role from the
/// profile store. Fails closed on every error path.
#[derive(Clone)]
pub struct RoleGuard {
    identity: IdentityState,
    profiles: ProfileState,
}

impl RoleGuard {
    pub fn new(identity: IdentityState, profiles: ProfileState) -> Self {
        Self { identity, profiles }
    }

    pub async fn check(&self, credential: Option<&str>, required: Role) -> GuardDecision<AuthorizedUser> {
        // 1. Principal. Nothing else runs without one.
        let Some(principal) = credential.and_then(|c| self.identity.current_principal(c)) else {
            return GuardDecision::Denied(DenialReason::NoPrincipal);
        };

        // 2. Profile lookup. Errors count as unauthorized.
        let profile = match self.profiles.get_profile(principal.id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::debug!(principal = %principal.id, "no profile record");
                return GuardDecision::Denied(DenialReason::ProfileNotFound);
            }
            Err(e) => {
                tracing::warn!(principal = %principal.id, "profile lookup failed: {}", e);
                return GuardDecision::Denied(DenialReason::LookupFailed);
            }
        };

        // 3. Role match.
        if profile.role != required {
            tracing::debug!(
                principal = %principal.id,
                required = %required,
                found = %profile.role,
                "role mismatch"
            );
            return GuardDecision::Denied(DenialReason::RoleMismatch {
                required,
                found: profile.role,
            });
        }

        GuardDecision::Authorized(AuthorizedUser { principal, profile })
    }
}

/// LocalSessionGuard
///
/// Variant for pages that authorize from the local session store. A failed
/// check also clears the stored entry so stale state cannot be reused.
#[derive(Clone)]
pub struct LocalSessionGuard {
    store: LocalSessionState,
}

impl LocalSessionGuard {
    pub fn new(store: LocalSessionState) -> Self {
        Self { store }
    }

    pub fn check(&self, session_id: Option<Uuid>, required: Role) -> GuardDecision<LocalSession> {
        let Some(id) = session_id else {
            return GuardDecision::Denied(DenialReason::NoLocalSession);
        };

        let Some(session) = self.store.get(id) else {
            return GuardDecision::Denied(DenialReason::NoLocalSession);
        };

        if session.role != required {
            self.store.clear(id);
            tracing::debug!(
                session = %id,
                required = %required,
                found = %session.role,
                "local session role mismatch, cleared"
            );
            return GuardDecision::Denied(DenialReason::RoleMismatch {
                required,
                found: session.role,
            });
        }

        GuardDecision::Authorized(session)
    }
}
