use crate::{
    AppState,
    auth::{
        ActivePrincipal, AdminPage, CREDENTIAL_COOKIE, CashierPage, CustomerPage, Guarded,
        LocalGuarded, LoginRedirect, SessionGone, credential,
    },
    idle::ActivityOutcome,
    models::{
        ActivityResponse, CheckoutRequest, ErrorResponse, LocalSession, LocalSessionResponse,
        PaymentIntentResponse, SessionGoneResponse,
    },
    orders::{demo_orders, escape_html, render_orders},
    payment::{PaymentError, intent_for_cart},
    session::LOCAL_SESSION_COOKIE,
    widget::{Cart, CartAction, NavWidget},
};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

// --- Page Scaffolding ---

// Reports pointer, key, click and scroll activity at most once a minute and
// follows the redirect the server hands back once the session is gone. An
// event inside the throttle window is sent by a single trailing report at the
// end of the window, so no activity is lost.
const ACTIVITY_SCRIPT: &str = r#"<script>
(function () {
  var THROTTLE_MS = 60000;
  var last = 0;
  var trailing = null;
  function send() {
    last = Date.now();
    fetch('/session/activity', { method: 'POST', credentials: 'same-origin' })
      .then(function (r) { return r.status === 401 ? r.json() : null; })
      .then(function (body) { if (body && body.redirect) { window.location.href = body.redirect; } });
  }
  function report() {
    var wait = THROTTLE_MS - (Date.now() - last);
    if (wait <= 0) { send(); return; }
    if (trailing === null) {
      trailing = setTimeout(function () { trailing = null; send(); }, wait);
    }
  }
  ['mousemove', 'keydown', 'click', 'scroll'].forEach(function (e) {
    window.addEventListener(e, report, { passive: true });
  });
})();
</script>"#;

fn page(title: &str, body: &str, monitored: bool) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}{}</body></html>",
        escape_html(title),
        body,
        if monitored { ACTIVITY_SCRIPT } else { "" },
    ))
}

fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "customer-required" => Some("Please log in with a customer account to continue."),
        "session-expired" => Some("You were logged out after 30 minutes of inactivity."),
        _ => None,
    }
}

// --- Public Pages ---

#[derive(Deserialize)]
pub struct LoginQuery {
    pub notice: Option<String>,
}

/// `?cart=open|close|dismiss` drives the nav widget; unknown values are ignored.
#[derive(Deserialize)]
pub struct NavQuery {
    pub cart: Option<String>,
}

fn nav_widget(signed_in: bool, query: &NavQuery) -> NavWidget {
    let mut widget = NavWidget::for_viewer(signed_in);
    if let Some(action) = query.cart.as_deref().and_then(CartAction::parse) {
        widget.apply(action);
    }
    widget
}

/// login_page
///
/// [Public Route] The login surface every failed guard redirects to. Known
/// notice codes render as an advisory message; unknown ones are ignored.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    let advisory = query
        .notice
        .as_deref()
        .and_then(notice_message)
        .map(|message| format!("<p class=\"advisory\" role=\"alert\">{}</p>", message))
        .unwrap_or_default();

    page(
        "Log in",
        &format!(
            "<main id=\"login\">{}<form id=\"login-form\"><input name=\"email\" type=\"email\">\
             <input name=\"password\" type=\"password\"><button type=\"submit\">Log in</button></form></main>",
            advisory
        ),
        false,
    )
}

/// index_page
///
/// [Public Route] Storefront landing page. The cart button opens the sidebar
/// for signed-in viewers and the login prompt for anonymous ones.
pub async fn index_page(
    State(state): State<AppState>,
    Query(query): Query<NavQuery>,
    headers: HeaderMap,
) -> Html<String> {
    let signed_in = credential(&headers)
        .and_then(|c| state.identity.current_principal(c))
        .is_some();
    let widget = nav_widget(signed_in, &query);

    page(
        "Storefront",
        &format!("{}<main id=\"catalogue\"><h1>Storefront</h1></main>", widget.render()),
        false,
    )
}

// --- Guarded Pages ---

/// admin_page
///
/// [Admin Page] Rendered only for principals whose profile role is Admin.
/// Starts a fresh idle monitoring cycle.
pub async fn admin_page(
    Guarded { user, .. }: Guarded<AdminPage>,
    State(state): State<AppState>,
) -> Html<String> {
    state.monitors.begin_page(user.principal.id);
    page(
        "Admin",
        &format!(
            "<main id=\"admin\"><h1>Administration</h1><p>Signed in as <span id=\"profile-name\">{}</span></p></main>",
            escape_html(&user.profile.display_name)
        ),
        true,
    )
}

/// customer_page
///
/// [Customer Page] Rendered only for Customer profiles. Denials carry the
/// `customer-required` advisory.
pub async fn customer_page(
    Guarded { user, .. }: Guarded<CustomerPage>,
    State(state): State<AppState>,
    Query(query): Query<NavQuery>,
) -> Html<String> {
    state.monitors.begin_page(user.principal.id);
    let widget = nav_widget(true, &query);
    page(
        "My account",
        &format!(
            "{}<main id=\"customer\"><h1>Welcome, <span id=\"profile-name\">{}</span></h1></main>",
            widget.render(),
            escape_html(&user.profile.display_name)
        ),
        true,
    )
}

/// cashier_page
///
/// [Cashier Page] Authorized from the local session store. The profile name
/// element is populated from the stored display name.
pub async fn cashier_page(
    LocalGuarded { session, .. }: LocalGuarded<CashierPage>,
    State(state): State<AppState>,
) -> Html<String> {
    state.monitors.begin_page(session.principal_id);
    page(
        "Till",
        &format!(
            "<main id=\"cashier\"><h1>Till</h1><p>Cashier: <span id=\"profile-name\">{}</span></p>{}</main>",
            escape_html(&session.display_name),
            render_orders(&demo_orders())
        ),
        true,
    )
}

// --- Session Endpoints ---

/// establish_cashier_session
///
/// [Cashier] Creates the local session the till page authorizes from. Only a
/// backend-verified Cashier profile can obtain one.
#[utoipa::path(
    post,
    path = "/cashier/session",
    responses(
        (status = 200, description = "Local session created", body = LocalSessionResponse),
        (status = 303, description = "Not a cashier, redirected to login")
    )
)]
pub async fn establish_cashier_session(
    Guarded { user, .. }: Guarded<CashierPage>,
    State(state): State<AppState>,
) -> Response {
    let session = LocalSession {
        principal_id: user.principal.id,
        role: user.profile.role,
        display_name: user.profile.display_name.clone(),
    };
    let session_id = state.local_sessions.put(session);
    tracing::info!(principal = %user.principal.id, "cashier local session established");

    let mut response = Json(LocalSessionResponse {
        role: user.profile.role,
        display_name: user.profile.display_name,
    })
    .into_response();

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        LOCAL_SESSION_COOKIE, session_id
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// record_activity
///
/// [Session] Rearms the caller's idle deadline. Answers 401 with a redirect
/// once the session has been terminated.
#[utoipa::path(
    post,
    path = "/session/activity",
    responses(
        (status = 200, description = "Deadline rearmed", body = ActivityResponse),
        (status = 401, description = "Session gone", body = SessionGoneResponse)
    )
)]
pub async fn record_activity(
    active: ActivePrincipal,
    State(state): State<AppState>,
) -> Result<Json<ActivityResponse>, SessionGone> {
    match state.monitors.record_activity(active.principal_id) {
        ActivityOutcome::Rearmed { expires_at } => Ok(Json(ActivityResponse { expires_at })),
        ActivityOutcome::Expired => Err(SessionGone {
            redirect: state.monitors.login_url().to_string(),
        }),
        // No cycle on record (e.g. after a restart): the page is live, so start one.
        ActivityOutcome::NotMonitored => {
            state.monitors.begin_page(active.principal_id);
            match state.monitors.record_activity(active.principal_id) {
                ActivityOutcome::Rearmed { expires_at } => Ok(Json(ActivityResponse { expires_at })),
                _ => Err(SessionGone {
                    redirect: state.config.login_url.clone(),
                }),
            }
        }
    }
}

/// logout
///
/// [Session] Stops the idle cycle, signs out and leaves for the login page.
/// The redirect happens even when the identity provider fails to sign out.
#[utoipa::path(
    post,
    path = "/session/logout",
    responses(
        (status = 303, description = "Signed out, redirected to login"),
        (status = 401, description = "No active session", body = SessionGoneResponse)
    )
)]
pub async fn logout(active: ActivePrincipal, State(state): State<AppState>) -> LoginRedirect {
    state.monitors.stop(active.principal_id);
    if let Some(session_id) = active.local_session {
        state.local_sessions.clear(session_id);
    }
    if let Err(e) = state.identity.sign_out(active.principal_id).await {
        tracing::warn!(principal = %active.principal_id, "sign-out failed: {}", e);
    }

    LoginRedirect::to(&state.config.login_url, None)
        .clearing(CREDENTIAL_COOKIE)
        .clearing(LOCAL_SESSION_COOKIE)
}

// --- Payments ---

/// create_payment_intent
///
/// [Customer] Creates a payment intent for the submitted cart and returns the
/// client secret the page confirms the payment with.
#[utoipa::path(
    post,
    path = "/payments/intent",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Intent created", body = PaymentIntentResponse),
        (status = 400, description = "Invalid cart", body = ErrorResponse),
        (status = 502, description = "Payment provider failure", body = ErrorResponse)
    )
)]
pub async fn create_payment_intent(
    Guarded { user, .. }: Guarded<CustomerPage>,
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<PaymentIntentResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut cart = Cart::new();
    for item in payload.items {
        cart.add(item);
    }
    let request = intent_for_cart(cart.items(), &payload.currency).map_err(payment_failure)?;

    let intent = state
        .payments
        .create_payment_intent(&request)
        .await
        .map_err(payment_failure)?;

    tracing::info!(principal = %user.principal.id, intent = %intent.id, "checkout started");
    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

fn payment_failure(error: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        PaymentError::Invalid(_) => StatusCode::BAD_REQUEST,
        PaymentError::NotConfigured
        | PaymentError::Transport(_)
        | PaymentError::Rejected { .. } => {
            tracing::error!("payment intent creation failed: {}", error);
            StatusCode::BAD_GATEWAY
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}
