use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Cashier Router Module
///
/// The till authorizes from the local session store rather than a remote
/// profile lookup. The session itself can only be created by a
/// backend-verified Cashier.
pub fn cashier_routes() -> Router<AppState> {
    Router::new()
        // POST /cashier/session
        // Exchanges a verified Cashier credential for a local session cookie.
        .route("/cashier/session", post(handlers::establish_cashier_session))
        // GET /cashier.html
        .route("/cashier.html", get(handlers::cashier_page))
}
