//! Application state and router builder
//!
//! This module defines the shared application state and provides
//! a function to build the Axum router with all routes and middleware.
//!
//! # Example
//!
//! ```no_run
//! use trendit_api::{app::AppState, config::Config};
//! use trendit_shared::payments::build_gateway;
//! use sqlx::PgPool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = PgPool::connect(&config.database.url).await?;
//! let gateway = build_gateway(&config.gateway)?;
//! let state = AppState::new(pool, config, gateway);
//! let app = trendit_api::app::build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{rate_limit::rate_limit_layer, security::SecurityHeadersLayer},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put},
    Extension, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use trendit_shared::{
    auth::{authorization, middleware::{authenticate, AuthContext}},
    payments::PaymentGateway,
    redis::RedisClient,
    telegram::TelegramNotifier,
};

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Rate limit store; `None` disables rate limiting
    pub redis: Option<RedisClient>,

    /// Configured payment provider
    pub gateway: Arc<dyn PaymentGateway>,

    /// Admin alerts; `None` when Telegram is not configured
    pub telegram: Option<TelegramNotifier>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            redis: None,
            gateway,
            telegram: None,
        }
    }

    pub fn with_redis(mut self, redis: RedisClient) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn with_telegram(mut self, telegram: TelegramNotifier) -> Self {
        self.telegram = Some(telegram);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # public
/// └── /v1/
///     ├── /auth/{signup,login,refresh}     # public
///     ├── GET  /pricing                    # public
///     ├── POST /payment/webhook            # public, signature checked
///     ├── POST /telegram/webhook           # public, secret token checked
///     ├── /profile, /settings/*            # JWT + rate limit
///     ├── /social-profiles
///     ├── /tasks, /current-user/tasks
///     ├── /generate-task, /perform-task, /performed-tasks
///     ├── /wallet/balance, /transactions
///     ├── /payment, /payment/verify, /payment/history
///     ├── /withdraw, /withdrawals
///     ├── /notifications, /stats
///     └── /admin/...                       # JWT + rate limit + admin role
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. Compression (gzip, br)
/// 3. CORS
/// 4. Tracing (tower-http TraceLayer)
/// 5. Authentication, rate limiting and the admin check (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let public_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/pricing", get(routes::pricing::list_pricing))
        .route("/payment/webhook", post(routes::payments::webhook))
        .route("/telegram/webhook", post(routes::telegram::webhook));

    let admin_routes = Router::new()
        .route("/dashboard", get(routes::admin::dashboard))
        .route("/tasks", get(routes::admin::list_tasks))
        .route("/tasks/:id", get(routes::admin::get_task))
        .route("/tasks/:id/approve", post(routes::admin::approve_task))
        .route("/tasks/:id/reject", post(routes::admin::reject_task))
        .route("/performed-tasks", get(routes::admin::list_performances))
        .route("/performed-tasks/:id", get(routes::admin::get_performance))
        .route("/performed-tasks/:id/accept", post(routes::admin::accept_performance))
        .route("/performed-tasks/:id/reject", post(routes::admin::reject_performance))
        .route("/users", get(routes::admin::list_users))
        .route("/transactions", get(routes::admin::list_transactions))
        .route("/messages", post(routes::admin::send_message))
        .route("/social-verifications", get(routes::admin::list_social_verifications))
        .route(
            "/social-verifications/:id/approve",
            post(routes::admin::approve_social_verification),
        )
        .route(
            "/social-verifications/:id/reject",
            post(routes::admin::reject_social_verification),
        )
        .route("/pricing", post(routes::pricing::create_pricing))
        .route(
            "/pricing/:id",
            put(routes::pricing::update_pricing).delete(routes::pricing::delete_pricing),
        )
        .route_layer(from_fn_with_state(state.clone(), admin_layer));

    let authenticated_routes = Router::new()
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route(
            "/settings/notifications",
            get(routes::settings::get_notification_settings).put(routes::settings::update_notification_settings),
        )
        .route(
            "/settings/preferences",
            get(routes::settings::get_preferences).put(routes::settings::update_preferences),
        )
        .route(
            "/settings/security",
            get(routes::settings::get_security).put(routes::settings::update_security),
        )
        .route(
            "/social-profiles",
            get(routes::social::list_profiles).post(routes::social::link_profile),
        )
        .route("/social-profiles/:platform", delete(routes::social::unlink_profile))
        .route("/tasks", post(routes::tasks::create_task).get(routes::tasks::list_tasks))
        .route("/tasks/counts/:field", get(routes::tasks::task_counts))
        .route("/tasks/:id_or_key", get(routes::tasks::get_task))
        .route("/current-user/tasks", get(routes::tasks::current_user_tasks))
        .route("/generate-task", post(routes::performances::generate_task))
        .route("/perform-task", post(routes::performances::perform_task))
        .route("/performed-tasks", get(routes::performances::list_performances))
        .route(
            "/performed-tasks/status/:status",
            get(routes::performances::list_performances_by_status),
        )
        .route(
            "/performed-tasks/:id",
            get(routes::performances::get_performance)
                .put(routes::performances::update_performance)
                .delete(routes::performances::delete_performance),
        )
        .route("/performed-tasks/:id/cancel", post(routes::performances::cancel_performance))
        .route("/wallet/balance", get(routes::wallet::balance))
        .route("/transactions", get(routes::wallet::transactions))
        .route("/payment", post(routes::payments::initialize_payment))
        .route("/payment/verify", post(routes::payments::verify_payment))
        .route("/payment/history", get(routes::payments::payment_history))
        .route("/withdraw", post(routes::withdrawals::withdraw))
        .route("/withdrawals", get(routes::withdrawals::list_withdrawals))
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/:id/read", post(routes::notifications::mark_read))
        .route("/stats", get(routes::stats::user_stats))
        .nest("/admin", admin_routes)
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    // Build complete v1 API
    let v1_routes = Router::new().merge(public_routes).merge(authenticated_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(crate::routes::tasks::CALLBACK_URL_HEADER),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer access token, then injects [`AuthContext`] into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Rejects callers without the `admin` role with 403
async fn admin_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorization::require_admin(&state.db, &auth).await?;

    Ok(next.run(req).await)
}
