use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. Nothing here renders protected
/// content; the index only decides which nav widget state to show.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Storefront landing page with the cart/nav widget.
        .route("/", get(handlers::index_page))
        // GET /login.html?notice=...
        // The login surface every failed guard redirects to.
        .route("/login.html", get(handlers::login_page))
}
