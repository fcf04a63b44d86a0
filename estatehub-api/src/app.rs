/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use estatehub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = estatehub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    client::TrustedProxies,
    clients::{
        facebook::{FacebookVerifier, SocialVerifier},
        geocoder::{Geocoder, NominatimGeocoder},
    },
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Duration;
use estatehub_shared::auth::{email_token::EmailTokenSigner, middleware::AuthContext};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

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

    /// Address to polygon lookup
    pub geocoder: Arc<dyn Geocoder>,

    /// Social access token verification
    pub social: Arc<dyn SocialVerifier>,

    /// Throttle for `/v1/users/token/code`
    pub limiter: Arc<RateLimiter>,

    /// Signs and checks email verification links
    pub email_tokens: EmailTokenSigner,
}

impl AppState {
    /// Creates application state with the given external clients
    pub fn new(
        db: PgPool,
        config: Config,
        geocoder: Arc<dyn Geocoder>,
        social: Arc<dyn SocialVerifier>,
    ) -> Self {
        let limiter = RateLimiter::new(RateLimit::per_minute(config.auth.two_factor_rate_per_minute));
        let email_tokens = EmailTokenSigner::new(
            config.auth.email_token_secret.as_bytes(),
            Duration::hours(config.auth.email_token_ttl_hours),
        );

        Self {
            db,
            config: Arc::new(config),
            geocoder,
            social,
            limiter: Arc::new(limiter),
            email_tokens,
        }
    }

    /// Creates application state with the production HTTP clients
    pub fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let geocoder = NominatimGeocoder::new(&config.geocoder)?;
        let social = FacebookVerifier::new(&config.facebook)?;

        Ok(Self::new(db, config, Arc::new(geocoder), Arc::new(social)))
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
/// ├── /health                          # Health check (public)
/// └── /v1/
///     ├── /users/
///     │   ├── POST /                   # Register
///     │   ├── GET  /                   # Current user (authenticated)
///     │   ├── POST /token              # First factor
///     │   ├── POST /token/code         # Second factor (throttled)
///     │   ├── POST /token/refresh      # New access token
///     │   ├── GET  /email              # Does an account exist
///     │   ├── POST /email/verify       # Resend verification email
///     │   ├── GET  /email/verify/:uid/:token
///     │   └── PUT  /2fa                # Toggle 2FA (authenticated)
///     ├── /properties/
///     │   ├── GET    /?address=...     # Geographic search
///     │   ├── POST   /                 # Create (authenticated)
///     │   ├── GET    /:id
///     │   ├── PATCH  /:id              # Update (authenticated owner)
///     │   └── DELETE /:id              # Delete (authenticated owner)
///     └── /agents/
///         ├── GET    /                 # List
///         ├── POST   /                 # Create (authenticated professional)
///         ├── GET    /:id
///         ├── GET    /:id/properties   # Agent's listings
///         ├── PATCH  /:id              # Update (authenticated member)
///         └── DELETE /:id              # Delete (authenticated member)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Response compression (gzip, brotli)
/// 4. Logging (tower-http TraceLayer)
/// 5. Trusted proxy count for client IP resolution
/// 6. Bearer authentication on `/v1`
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Second factor is throttled per client IP
    let code_routes = Router::new()
        .route("/token/code", post(routes::users::token_code))
        .layer(from_fn_with_state(state.clone(), rate_limit_layer));

    let user_routes = Router::new()
        .route("/", post(routes::users::register).get(routes::users::me))
        .route("/token", post(routes::users::token))
        .route("/token/refresh", post(routes::users::refresh))
        .route("/email", get(routes::users::email_exists))
        .route("/email/verify", post(routes::users::send_verification))
        .route("/email/verify/:uid/:token", get(routes::users::verify_email))
        .route("/2fa", put(routes::users::set_two_factor))
        .merge(code_routes);

    let property_routes = Router::new()
        .route(
            "/",
            get(routes::properties::search).post(routes::properties::create_property),
        )
        .route(
            "/:id",
            get(routes::properties::get_property)
                .patch(routes::properties::update_property)
                .delete(routes::properties::delete_property),
        );

    let agent_routes = Router::new()
        .route(
            "/",
            get(routes::agents::list_agents).post(routes::agents::create_agent),
        )
        .route(
            "/:id",
            get(routes::agents::get_agent)
                .patch(routes::agents::update_agent)
                .delete(routes::agents::delete_agent),
        )
        .route("/:id/properties", get(routes::agents::list_agent_properties));

    let v1_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/properties", property_routes)
        .nest("/agents", agent_routes)
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
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
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let proxies = TrustedProxies(state.config.api.trusted_proxy_hops);

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(Extension(proxies))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer authentication layer
///
/// A request that sends `Authorization` must carry a valid access token; its
/// [`AuthContext`] is then added to the request extensions. Requests without
/// the header pass through anonymously and are turned away by handlers that
/// extract `AuthContext`.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.headers().contains_key(header::AUTHORIZATION) {
        let auth_context = AuthContext::from_headers(req.headers(), state.jwt_secret())?;
        req.extensions_mut().insert(auth_context);
    }

    Ok(next.run(req).await)
}
