use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use storefront_guard::{
    AppState, InMemoryLocalSessions, InMemoryProfileStore, JwtIdentityProvider, PostgresProfileStore,
    StripeClient,
    config::{AppConfig, Env},
    create_router,
    identity::IdentityState,
    payment::PaymentState,
    repository::ProfileState,
    session::LocalSessionState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the collaborators and
/// serves the storefront.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_guard=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Storefront starting in {:?} mode", config.env);

    // 3. Profile store: Postgres when configured, in-memory otherwise (local only).
    let profiles: ProfileState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            Arc::new(PostgresProfileStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using an empty in-memory profile store");
            Arc::new(InMemoryProfileStore::new())
        }
    };

    // 4. Identity, local sessions and payments.
    let identity: IdentityState = Arc::new(JwtIdentityProvider::new(&config.jwt_secret));
    let local_sessions: LocalSessionState = Arc::new(InMemoryLocalSessions::new());
    let payments: PaymentState = Arc::new(StripeClient::new(
        &config.stripe_api_base,
        &config.stripe_secret_key,
    ));

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, identity, profiles, local_sessions, payments);

    // 5. Router and server.
    let app = create_router(app_state);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("HTTP server terminated unexpectedly");
}
