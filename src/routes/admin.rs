use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Pages rendered only for principals whose profile role is Admin. The check
/// runs in the `Guarded<AdminPage>` extractor before the handler body.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin.html
        .route("/admin.html", get(handlers::admin_page))
}
