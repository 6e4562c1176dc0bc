mod common;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Method, Request, Uri, header, request::Parts},
};
use common::{create_token, profile, test_context};
use storefront_guard::{
    auth::{
        ActivePrincipal, AdminPage, CashierPage, CustomerPage, Guarded, LocalGuarded,
        LoginRedirect, cookie_value, credential, local_session_id,
    },
    models::{LocalSession, Role},
    session::LocalSessionStore,
};
use uuid::Uuid;

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

// --- Header parsing ---

#[test]
fn test_cookie_value_finds_named_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("a=1; sf_token=abc.def; b=2"));

    assert_eq!(cookie_value(&headers, "sf_token"), Some("abc.def"));
    assert_eq!(cookie_value(&headers, "b"), Some("2"));
    assert_eq!(cookie_value(&headers, "missing"), None);
}

#[test]
fn test_bearer_header_wins_over_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
    headers.insert(header::COOKIE, HeaderValue::from_static("sf_token=from-cookie"));
    assert_eq!(credential(&headers), Some("from-header"));

    headers.remove(header::AUTHORIZATION);
    assert_eq!(credential(&headers), Some("from-cookie"));

    headers.insert(header::COOKIE, HeaderValue::from_static("sf_token="));
    assert_eq!(credential(&headers), None);
}

#[test]
fn test_local_session_id_requires_a_uuid() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("sf_session=not-a-uuid"));
    assert_eq!(local_session_id(&headers), None);

    let id = Uuid::new_v4();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("sf_session={}", id)).unwrap(),
    );
    assert_eq!(local_session_id(&headers), Some(id));
}

#[test]
fn test_login_redirect_location() {
    assert_eq!(LoginRedirect::to("/login.html", None).location(), "/login.html");
    assert_eq!(
        LoginRedirect::to("/login.html", Some("customer-required")).location(),
        "/login.html?notice=customer-required"
    );
}

// --- Extractors ---

#[tokio::test]
async fn test_guarded_extractor_success_with_valid_jwt() {
    let ctx = test_context();
    let id = Uuid::new_v4();
    ctx.profiles.insert(profile(id, "Ada", Role::Admin));
    let mut parts = with_bearer(&create_token(id, 3600));

    let guarded = Guarded::<AdminPage>::from_request_parts(&mut parts, &ctx.state).await;

    let guarded = guarded.ok().expect("admin should pass the admin guard");
    assert_eq!(guarded.user.principal.id, id);
    assert_eq!(guarded.user.profile.role, Role::Admin);
}

#[tokio::test]
async fn test_guarded_extractor_failure_with_missing_header() {
    let ctx = test_context();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let result = Guarded::<AdminPage>::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(result.err(), Some(LoginRedirect::to("/login.html", None)));
}

#[tokio::test]
async fn test_guarded_extractor_customer_denial_has_notice() {
    let ctx = test_context();
    let id = Uuid::new_v4();
    ctx.profiles.insert(profile(id, "Chen", Role::Cashier));
    let mut parts = with_bearer(&create_token(id, 3600));

    let result = Guarded::<CustomerPage>::from_request_parts(&mut parts, &ctx.state).await;

    let redirect = result.err().expect("cashier must not pass the customer guard");
    assert_eq!(redirect.location(), "/login.html?notice=customer-required");
}

#[tokio::test]
async fn test_local_guarded_extractor_reads_session_cookie() {
    let ctx = test_context();
    let principal_id = Uuid::new_v4();
    let session_id = ctx.sessions.put(LocalSession {
        principal_id,
        role: Role::Cashier,
        display_name: "Chen".to_string(),
    });

    let mut parts = get_request_parts(Method::GET, "/cashier.html".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("sf_session={}", session_id)).unwrap(),
    );

    let local = LocalGuarded::<CashierPage>::from_request_parts(&mut parts, &ctx.state)
        .await
        .ok()
        .expect("cashier session should pass");

    assert_eq!(local.session_id, session_id);
    assert_eq!(local.session.principal_id, principal_id);
}

#[tokio::test]
async fn test_active_principal_falls_back_to_local_session() {
    let ctx = test_context();
    let principal_id = Uuid::new_v4();
    let session_id = ctx.sessions.put(LocalSession {
        principal_id,
        role: Role::Cashier,
        display_name: "Chen".to_string(),
    });

    let mut parts = get_request_parts(Method::POST, "/session/activity".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("sf_session={}", session_id)).unwrap(),
    );

    let active = ActivePrincipal::from_request_parts(&mut parts, &ctx.state)
        .await
        .expect("local session should identify the principal");

    assert_eq!(active.principal_id, principal_id);
    assert_eq!(active.local_session, Some(session_id));
}

#[tokio::test]
async fn test_active_principal_rejects_anonymous_requests() {
    let ctx = test_context();
    let mut parts = get_request_parts(Method::POST, "/session/activity".parse().unwrap());

    let result = ActivePrincipal::from_request_parts(&mut parts, &ctx.state).await;

    let gone = result.err().expect("anonymous request must be rejected");
    assert_eq!(gone.redirect, "/login.html");
}
