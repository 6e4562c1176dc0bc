use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Session Router Module
///
/// Endpoints the protected pages call while open.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        // POST /session/activity
        // Rearms the idle deadline; 401 with a redirect once the session is gone.
        .route("/session/activity", post(handlers::record_activity))
        // POST /session/logout
        .route("/session/logout", post(handlers::logout))
}
