use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Customer Router Module
///
/// Customer pages and checkout. Denials redirect to login with the
/// `customer-required` advisory.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        // GET /customer.html
        .route("/customer.html", get(handlers::customer_page))
        // POST /payments/intent
        // Creates a payment intent for the submitted cart.
        .route("/payments/intent", post(handlers::create_payment_intent))
}
