#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};
use storefront_guard::{
    AppState, InMemoryLocalSessions, InMemoryProfileStore, JwtIdentityProvider,
    config::AppConfig,
    events::{SessionEvents, SessionHandler, Subscription},
    identity::{Claims, IdentityError, IdentityProvider, IdentityState, Principal},
    models::{PaymentIntent, PaymentIntentRequest, Profile, Role},
    navigation::Navigator,
    payment::{PaymentError, PaymentProvider},
    repository::{ProfileError, ProfileStore},
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs a credential issued now that expires `exp_offset` seconds from now.
pub fn create_token(user_id: Uuid, exp_offset: u64) -> String {
    let now = now_secs();
    create_token_at(user_id, now, now + exp_offset)
}

pub fn create_token_at(user_id: Uuid, iat: u64, exp: u64) -> String {
    let claims = Claims {
        sub: user_id,
        iat: iat as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn profile(id: Uuid, display_name: &str, role: Role) -> Profile {
    Profile {
        id,
        display_name: display_name.to_string(),
        role,
    }
}

// --- Mock Collaborators ---

/// Payment provider that records every request and answers with a canned intent.
#[derive(Default)]
pub struct MockPayments {
    pub requests: Mutex<Vec<PaymentIntentRequest>>,
    pub fail: bool,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        self.requests.lock().push(request.clone());
        if self.fail {
            return Err(PaymentError::Rejected {
                status: 402,
                message: "card declined".to_string(),
            });
        }
        Ok(PaymentIntent {
            id: "pi_test_1".to_string(),
            client_secret: "pi_test_1_secret_abc".to_string(),
            amount: request.amount,
            currency: request.currency.clone(),
            status: "requires_payment_method".to_string(),
        })
    }
}

/// Profile store whose every lookup fails, counting the attempts.
#[derive(Default)]
pub struct FailingProfiles {
    pub lookups: AtomicUsize,
}

#[async_trait]
impl ProfileStore for FailingProfiles {
    async fn get_profile(&self, _id: Uuid) -> Result<Option<Profile>, ProfileError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Err(ProfileError::Unavailable("connection refused".to_string()))
    }
}

/// In-memory store that counts lookups, for asserting that no lookup ran.
#[derive(Default)]
pub struct CountingProfiles {
    pub inner: InMemoryProfileStore,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl ProfileStore for CountingProfiles {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, ProfileError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_profile(id).await
    }
}

/// Identity provider that only counts sign-outs, optionally failing them.
#[derive(Default)]
pub struct CountingIdentity {
    pub sign_outs: AtomicUsize,
    pub fail_sign_out: bool,
    events: SessionEvents,
}

impl CountingIdentity {
    pub fn failing() -> Self {
        Self {
            fail_sign_out: true,
            ..Self::default()
        }
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for CountingIdentity {
    fn current_principal(&self, _credential: &str) -> Option<Principal> {
        None
    }

    async fn sign_out(&self, principal_id: Uuid) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(IdentityError::SignOutRejected(principal_id));
        }
        Ok(())
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.events.subscribe(handler)
    }
}

/// Navigator that records every redirect.
#[derive(Default)]
pub struct RecordingNavigator {
    pub redirects: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNavigator {
    pub fn count(&self) -> usize {
        self.redirects.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, principal_id: Uuid, url: &str) {
        self.redirects.lock().push((principal_id, url.to_string()));
    }
}

// --- Application State ---

pub struct TestContext {
    pub state: AppState,
    pub profiles: Arc<InMemoryProfileStore>,
    pub sessions: Arc<InMemoryLocalSessions>,
    pub payments: Arc<MockPayments>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config
}

pub fn test_context() -> TestContext {
    test_context_with(test_config())
}

pub fn test_context_with(config: AppConfig) -> TestContext {
    let identity: IdentityState = Arc::new(JwtIdentityProvider::new(&config.jwt_secret));
    let profiles = Arc::new(InMemoryProfileStore::new());
    let sessions = Arc::new(InMemoryLocalSessions::new());
    let payments = Arc::new(MockPayments::default());

    let state = AppState::new(
        config,
        identity,
        profiles.clone(),
        sessions.clone(),
        payments.clone(),
    );

    TestContext {
        state,
        profiles,
        sessions,
        payments,
    }
}
