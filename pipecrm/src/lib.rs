//! # pipecrm: Multi-tenant Sales Pipeline CRM
//!
//! `pipecrm` is the HTTP backend of a subscription SaaS CRM. Every signed-in user owns exactly one
//! sales pipeline, a board of ordered stages holding deals. Access to the board is sold as a
//! subscription, so the service also keeps each user's subscription state in step with the
//! payment provider and refuses pipeline traffic from users who are not paying.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Credentials and sessions belong to an auth backend behind
//! the [`auth_providers::AuthProvider`] trait, either the built-in argon2 + JWT backend or a
//! hosted Supabase project. Subscriptions belong to a billing provider behind the
//! [`billing::BillingProvider`] trait, currently Stripe.
//!
//! ### Request Flow
//!
//! - **Auth endpoints** (`/auth/*`) are public. Each is guarded by a fixed-window
//!   [`limits::RateLimiter`] keyed by operation and client address, and answers `429` with a
//!   `Retry-After` header once the budget is spent.
//! - **Billing webhook** (`/billing/webhook`) authenticates deliveries by their HMAC signature
//!   over the raw body, then maps the event onto the matching profile.
//! - **Pipeline endpoints** (`/pipeline/*`, `/dashboard`) pass through the subscription gate
//!   ([`subscription::ActiveSubscriber`]), which rejects with `401` or `402` plus a redirect
//!   path. The first visit bootstraps the user's pipeline with the default stages.
//!
//! ### Password Reset
//!
//! `/auth/forgot-password` always answers success so it cannot be used to probe for registered
//! emails. Known addresses receive a single-use link that expires after
//! `auth.password_reset.token_duration`. Issuing a link invalidates earlier ones.
//!
//! ## Configuration
//!
//! Configuration is loaded from a YAML file with `PIPECRM_`-prefixed environment overrides. See
//! the [`config`] module for details.
//!
//! ## Getting Started
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/pipecrm PIPECRM_SECRET_KEY=change-me pipecrm -f config.yaml
//! ```
//!
//! The OpenAPI reference is served at `/docs`.

pub mod api;
pub mod auth;
pub mod auth_providers;
pub mod billing;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod limits;
mod openapi;
pub mod subscription;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{self, HeaderName, HeaderValue, Method},
    routing::{get, patch, post},
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::{DealId, PipelineId, StageId, UserId};

use crate::{
    auth::current_user::REFRESH_TOKEN_HEADER, auth_providers::AuthProvider, billing::BillingProvider, config::CorsOrigin,
    email::EmailService, limits::RateLimiter, openapi::ApiDoc,
};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .rate_limiter(Arc::new(RateLimiter::from_config(&config.rate_limits)))
///     .auth(auth_provider)
///     .email(Arc::new(email_service))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
    pub auth: Arc<dyn AuthProvider>,
    /// `None` when `billing` is absent from the configuration
    pub billing: Option<Arc<dyn BillingProvider>>,
    pub email: Arc<EmailService>,
}

impl AppState {
    /// Wire up the providers named in `config` around an existing pool.
    pub fn from_config(config: Config, db: PgPool) -> anyhow::Result<Self> {
        let auth = auth_providers::create_provider(&config, db.clone())?;
        let billing = config.billing.as_ref().map(billing::create_provider);
        let email = EmailService::new(&config)?;
        let rate_limiter = RateLimiter::from_config(&config.rate_limits);

        Ok(Self::builder()
            .db(db)
            .rate_limiter(Arc::new(rate_limiter))
            .auth(auth)
            .maybe_billing(billing)
            .email(Arc::new(email))
            .config(config)
            .build())
    }
}

/// Get the pipecrm database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let Some(database_url) = config.database_url.as_deref() else {
        anyhow::bail!("No database configured. Set DATABASE_URL or database_url in the config file.");
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout)
        .connect(database_url)
        .await?;

    migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.cors.allowed_origins;

    let allow_origin = if allowed.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a trailing slash, but Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ])
        .expose_headers([http::header::RETRY_AFTER]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/forgot-password", post(api::handlers::auth::forgot_password))
        .route("/auth/reset-password", post(api::handlers::auth::reset_password))
        .route("/auth/subscription-status", post(api::handlers::auth::subscription_status))
        .with_state(state.clone());

    let billing_routes = Router::new()
        .route("/billing/webhook", post(api::handlers::billing::webhook))
        .route("/billing/checkout", get(api::handlers::billing::checkout))
        .with_state(state.clone());

    // Everything here sits behind the subscription gate
    let pipeline_routes = Router::new()
        .route("/pipeline", get(api::handlers::pipeline::get_board))
        .route("/pipeline/deals", post(api::handlers::pipeline::create_deal))
        .route("/pipeline/deals/{id}", patch(api::handlers::pipeline::move_deal))
        .route("/dashboard", get(api::handlers::dashboard::get_dashboard))
        .with_state(state.clone());

    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(billing_routes)
        .merge(pipeline_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// A configured, ready to serve instance of the CRM API.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    providers and router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown future resolves, in-flight requests finish and the pool is
///    closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on top of an existing pool, or connect one from `config`.
    ///
    /// A supplied pool is assumed to be migrated already.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting pipecrm with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => setup_database(&config).await?,
        };

        let app_state = AppState::from_config(config.clone(), pool.clone())?;
        let router = build_router(app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("pipecrm listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_config, ensure_crypto_provider};
    use axum::http::StatusCode;
    use serde_json::Value;

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        ensure_crypto_provider();
        let app = Application::new_with_pool(create_test_config(), Some(pool))
            .await
            .expect("Failed to create application");
        let server = app.into_test_server();

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        server.get("/docs").await.assert_status_ok();

        // Unknown routes fall through to a plain 404
        server.get("/admin").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_gated_routes_reject_anonymous_callers(pool: PgPool) {
        let server = crate::test_utils::create_test_app(pool, create_test_config()).await;

        for path in ["/pipeline", "/dashboard"] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            assert_eq!(response.json::<Value>()["redirect"], "/login", "{path}");
        }
    }

    #[sqlx::test]
    async fn test_cors_preflight_allows_configured_origin(pool: PgPool) {
        let server = crate::test_utils::create_test_app(pool, create_test_config()).await;

        let response = server
            .method(Method::OPTIONS, "/auth/login")
            .add_header("origin", "http://localhost:3000")
            .add_header("access-control-request-method", "POST")
            .await;

        assert_eq!(
            response.header("access-control-allow-origin").to_str().unwrap(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_wildcard_cors_origin_builds() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard, CorsOrigin::Url("https://crm.example.com".parse().unwrap())];
        assert!(create_cors_layer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_setup_requires_database_url() {
        let mut config = create_test_config();
        config.database_url = None;
        let err = setup_database(&config).await.unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
