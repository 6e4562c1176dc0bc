use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use std::{marker::PhantomData, sync::Arc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    guard::{AuthorizedUser, DenialReason, GuardDecision, LocalSessionGuard, RoleGuard},
    identity::IdentityState,
    models::{LocalSession, Role, SessionGoneResponse},
    navigation::RedirectQueue,
    repository::ProfileState,
    session::{LOCAL_SESSION_COOKIE, LocalSessionState},
};

/// Cookie carrying the session credential for plain page loads.
pub const CREDENTIAL_COOKIE: &str = "sf_token";

/// PageRole
///
/// Binds a page type to the role it requires. `NOTICE` is an optional
/// advisory code appended to the login redirect (`?notice=...`).
pub trait PageRole: Send + Sync + 'static {
    const ROLE: Role;
    const NOTICE: Option<&'static str> = None;
}

pub struct AdminPage;
pub struct CustomerPage;
pub struct CashierPage;

impl PageRole for AdminPage {
    const ROLE: Role = Role::Admin;
}

impl PageRole for CustomerPage {
    const ROLE: Role = Role::Customer;
    const NOTICE: Option<&'static str> = Some("customer-required");
}

impl PageRole for CashierPage {
    const ROLE: Role = Role::Cashier;
}

/// Reads one cookie value from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
        .next()
}

/// Bearer header first, then the credential cookie.
pub fn credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| cookie_value(headers, CREDENTIAL_COOKIE))
        .filter(|token| !token.is_empty())
}

pub fn local_session_id(headers: &HeaderMap) -> Option<Uuid> {
    cookie_value(headers, LOCAL_SESSION_COOKIE).and_then(|raw| Uuid::parse_str(raw).ok())
}

pub fn expired_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name)
}

/// Consumes the redirect queued for the subject of a credential that no
/// longer resolves to a principal.
fn pending_for_credential(
    identity: &IdentityState,
    redirects: &RedirectQueue,
    credential: &str,
) -> Option<String> {
    identity
        .subject(credential)
        .and_then(|principal_id| redirects.take(principal_id))
}

fn append_expired_cookies(response: &mut Response, names: &[&'static str]) {
    for name in names {
        if let Ok(value) = HeaderValue::from_str(&expired_cookie(name)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

/// LoginRedirect
///
/// Rejection for every failed page guard: a full-page redirect (303) to the
/// login surface, optionally expiring cookies that must not be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    location: String,
    clear_cookies: Vec<&'static str>,
}

impl LoginRedirect {
    pub fn to(login_url: &str, notice: Option<&str>) -> Self {
        let location = match notice {
            Some(code) => format!("{}?notice={}", login_url, code),
            None => login_url.to_string(),
        };
        Self {
            location,
            clear_cookies: Vec::new(),
        }
    }

    pub fn clearing(mut self, cookie: &'static str) -> Self {
        self.clear_cookies.push(cookie);
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let mut response = Redirect::to(&self.location).into_response();
        append_expired_cookies(&mut response, &self.clear_cookies);
        response
    }
}

/// Guarded
///
/// Extractor that runs the backend-verified Role Guard for page type `P`.
/// Handlers taking a `Guarded<P>` only execute once the principal's profile
/// role equals `P::ROLE`; every other outcome becomes a `LoginRedirect`.
pub struct Guarded<P: PageRole> {
    pub user: AuthorizedUser,
    page: PhantomData<P>,
}

impl<S, P> FromRequestParts<S> for Guarded<P>
where
    S: Send + Sync,
    P: PageRole,
    IdentityState: FromRef<S>,
    ProfileState: FromRef<S>,
    AppConfig: FromRef<S>,
    Arc<RedirectQueue>: FromRef<S>,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let identity = IdentityState::from_ref(state);
        let redirects = Arc::<RedirectQueue>::from_ref(state);
        let guard = RoleGuard::new(identity.clone(), ProfileState::from_ref(state));
        let presented = credential(&parts.headers);

        match guard.check(presented, P::ROLE).await {
            GuardDecision::Authorized(user) => {
                if let Some(location) = redirects.take(user.principal.id) {
                    return Err(LoginRedirect::to(&location, None));
                }
                Ok(Guarded {
                    user,
                    page: PhantomData,
                })
            }
            GuardDecision::Denied(reason) => {
                tracing::debug!(?reason, required = %P::ROLE, "page guard denied");
                if reason != DenialReason::NoPrincipal {
                    return Err(LoginRedirect::to(&config.login_url, P::NOTICE));
                }
                let Some(presented) = presented else {
                    return Err(LoginRedirect::to(&config.login_url, P::NOTICE));
                };
                // A credential that resolves to nobody is useless; drop it.
                let redirect = match pending_for_credential(&identity, &redirects, presented) {
                    Some(location) => LoginRedirect::to(&location, None),
                    None => LoginRedirect::to(&config.login_url, P::NOTICE),
                };
                Err(redirect.clearing(CREDENTIAL_COOKIE))
            }
        }
    }
}

/// LocalGuarded
///
/// Extractor for pages that authorize from the local session store. Any
/// failure clears the stored entry and expires the session cookie.
pub struct LocalGuarded<P: PageRole> {
    pub session_id: Uuid,
    pub session: LocalSession,
    page: PhantomData<P>,
}

impl<S, P> FromRequestParts<S> for LocalGuarded<P>
where
    S: Send + Sync,
    P: PageRole,
    LocalSessionState: FromRef<S>,
    AppConfig: FromRef<S>,
    Arc<RedirectQueue>: FromRef<S>,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let store = LocalSessionState::from_ref(state);
        let session_id = local_session_id(&parts.headers);

        match LocalSessionGuard::new(store.clone()).check(session_id, P::ROLE) {
            GuardDecision::Authorized(session) => {
                let redirects = Arc::<RedirectQueue>::from_ref(state);
                let id = session_id.unwrap_or_default();
                if let Some(location) = redirects.take(session.principal_id) {
                    store.clear(id);
                    return Err(LoginRedirect::to(&location, None).clearing(LOCAL_SESSION_COOKIE));
                }
                Ok(LocalGuarded {
                    session_id: id,
                    session,
                    page: PhantomData,
                })
            }
            GuardDecision::Denied(reason) => {
                tracing::debug!(?reason, required = %P::ROLE, "local page guard denied");
                let pending = session_id.and_then(|id| {
                    store.clear(id);
                    Arc::<RedirectQueue>::from_ref(state).take_for_session(id)
                });
                let redirect = match pending {
                    Some(location) => LoginRedirect::to(&location, None),
                    None => LoginRedirect::to(&config.login_url, P::NOTICE),
                };
                Err(redirect.clearing(LOCAL_SESSION_COOKIE))
            }
        }
    }
}

/// SessionGone
///
/// Rejection for JSON session endpoints: 401 with the URL the page must
/// navigate to.
#[derive(Debug)]
pub struct SessionGone {
    pub redirect: String,
}

impl IntoResponse for SessionGone {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(SessionGoneResponse {
                redirect: self.redirect,
            }),
        )
            .into_response();
        append_expired_cookies(&mut response, &[CREDENTIAL_COOKIE, LOCAL_SESSION_COOKIE]);
        response
    }
}

/// ActivePrincipal
///
/// Resolves the principal behind a session endpoint call, from the bearer
/// credential or, failing that, from the local session cookie.
#[derive(Debug, Clone)]
pub struct ActivePrincipal {
    pub principal_id: Uuid,
    pub local_session: Option<Uuid>,
}

impl<S> FromRequestParts<S> for ActivePrincipal
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    LocalSessionState: FromRef<S>,
    AppConfig: FromRef<S>,
    Arc<RedirectQueue>: FromRef<S>,
{
    type Rejection = SessionGone;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let identity = IdentityState::from_ref(state);
        let store = LocalSessionState::from_ref(state);
        let redirects = Arc::<RedirectQueue>::from_ref(state);

        let presented = credential(&parts.headers);
        let from_credential = presented
            .and_then(|c| identity.current_principal(c))
            .map(|principal| principal.id);

        let local_session = local_session_id(&parts.headers);
        let from_local = local_session
            .and_then(|id| store.get(id))
            .map(|session| session.principal_id);

        let Some(principal_id) = from_credential.or(from_local) else {
            // Signed out already; a queued redirect may still be waiting.
            let pending = presented
                .and_then(|c| pending_for_credential(&identity, &redirects, c))
                .or_else(|| local_session.and_then(|id| redirects.take_for_session(id)));
            return Err(SessionGone {
                redirect: pending.unwrap_or(config.login_url),
            });
        };

        if let Some(location) = redirects.take(principal_id) {
            return Err(SessionGone { redirect: location });
        }

        Ok(ActivePrincipal {
            principal_id,
            local_session,
        })
    }
}
