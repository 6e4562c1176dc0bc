use axum::{Router, extract::FromRef, http::HeaderName};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod events;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod idle;
pub mod models;
pub mod navigation;
pub mod orders;
pub mod payment;
pub mod repository;
pub mod session;
pub mod widget;

pub mod routes;
use routes::{admin, cashier, customer, public, session as session_routes};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use events::{SessionChange, Subscription};
pub use identity::{IdentityState, JwtIdentityProvider};
pub use idle::IdleMonitors;
pub use navigation::RedirectQueue;
pub use payment::{PaymentState, StripeClient};
pub use repository::{InMemoryProfileStore, PostgresProfileStore, ProfileState};
pub use session::{InMemoryLocalSessions, LocalSessionState};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::establish_cashier_session, handlers::record_activity,
        handlers::logout, handlers::create_payment_intent
    ),
    components(
        schemas(
            models::Role, models::CartItem, models::CheckoutRequest,
            models::PaymentIntentResponse, models::ActivityResponse,
            models::SessionGoneResponse, models::LocalSessionResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "storefront", description = "Storefront session and checkout API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared container for every collaborator a request may need. Cheap to
/// clone: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityState,
    pub profiles: ProfileState,
    pub local_sessions: LocalSessionState,
    pub payments: PaymentState,
    pub monitors: Arc<IdleMonitors>,
    pub redirects: Arc<RedirectQueue>,
    pub config: AppConfig,
    // Auth-state observers stay registered for as long as the state lives.
    subscriptions: Arc<Vec<Subscription>>,
}

impl AppState {
    /// Assembles the state and wires the auth-state observers:
    /// a sign-out clears the principal's local sessions and idle cycle, and a
    /// fresh sign-in discards any forced redirect still queued for it.
    pub fn new(
        config: AppConfig,
        identity: IdentityState,
        profiles: ProfileState,
        local_sessions: LocalSessionState,
        payments: PaymentState,
    ) -> Self {
        let redirects = Arc::new(RedirectQueue::new());
        let monitors = Arc::new(IdleMonitors::new(
            config.idle_timeout,
            format!("{}?notice=session-expired", config.login_url),
            identity.clone(),
            redirects.clone(),
        ));

        let subscriptions = {
            let local_sessions = local_sessions.clone();
            let monitors = monitors.clone();
            let redirects = redirects.clone();
            identity.on_session_change(Box::new(move |change: &SessionChange| match change {
                SessionChange::SignedOut(principal_id) => {
                    let cleared = local_sessions.clear_principal(*principal_id);
                    // Cleared cookies can still claim a pending idle redirect.
                    redirects.bind_sessions(*principal_id, &cleared);
                    monitors.stop(*principal_id);
                    tracing::debug!(principal = %principal_id, cleared = cleared.len(), "session state released");
                }
                SessionChange::SignedIn(principal) => {
                    redirects.take(principal.id);
                    tracing::debug!(principal = %principal.id, "principal signed in");
                }
            }))
        };

        Self {
            identity,
            profiles,
            local_sessions,
            payments,
            monitors,
            redirects,
            config,
            subscriptions: Arc::new(vec![subscriptions]),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for ProfileState {
    fn from_ref(app_state: &AppState) -> ProfileState {
        app_state.profiles.clone()
    }
}

impl FromRef<AppState> for LocalSessionState {
    fn from_ref(app_state: &AppState) -> LocalSessionState {
        app_state.local_sessions.clone()
    }
}

impl FromRef<AppState> for Arc<RedirectQueue> {
    fn from_ref(app_state: &AppState) -> Arc<RedirectQueue> {
        app_state.redirects.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route group, the docs, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(admin::admin_routes())
        .merge(customer::customer_routes())
        .merge(cashier::cashier_routes())
        .merge(session_routes::session_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Builds the per-request span, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
