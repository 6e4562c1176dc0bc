use std::{env, time::Duration};

/// Default inactivity window before a session is forcibly signed out.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const LOCAL_JWT_SECRET: &str = "storefront-local-development-secret";

/// AppConfig
///
/// Immutable configuration loaded once at startup and shared through the
/// application state via FromRef. Every secret (JWT signing key, payment
/// provider key) arrives from the environment; none is embedded in source.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Production demands every secret explicitly.
    pub env: Env,
    // Postgres connection string for the profiles table. Optional locally,
    // in which case an in-memory profile store is used.
    pub db_url: Option<String>,
    // HS256 secret the identity provider signs session credentials with.
    pub jwt_secret: String,
    // Payment provider secret key, injected from the environment.
    pub stripe_secret_key: String,
    // Payment provider API root. Overridable so tests can point it at a stub.
    pub stripe_api_base: String,
    // Login surface every failed guard check redirects to.
    pub login_url: String,
    // Inactivity window for the idle session monitor.
    pub idle_timeout: Duration,
    // Socket address the HTTP server binds.
    pub bind_addr: String,
}

/// Env
///
/// Runtime context: local development versus hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            stripe_secret_key: "sk_test_placeholder".to_string(),
            stripe_api_base: "http://localhost:12111".to_string(),
            login_url: "/login.html".to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL`, `JWT_SECRET` or
    /// `STRIPE_SECRET_KEY` is missing, so the service never starts with an
    /// incomplete or insecure configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let idle_timeout = env::var("IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT);

        let stripe_api_base =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let login_url = env::var("LOGIN_URL").unwrap_or_else(|_| "/login.html".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                // An empty key makes every payment call fail at the provider
                // instead of silently using someone else's credential.
                stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
                stripe_api_base,
                login_url,
                idle_timeout,
                bind_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("JWT_SECRET")
                    .expect("FATAL: JWT_SECRET must be set in production."),
                stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                    .expect("FATAL: STRIPE_SECRET_KEY must be set in production."),
                stripe_api_base,
                login_url,
                idle_timeout,
                bind_addr,
            },
        }
    }
}
