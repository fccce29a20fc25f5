//! Habitat - guest access, challenges and naturalist journeys over HTTP.

pub mod auth;
pub mod cache;
pub mod challenges;
pub mod clustering;
pub mod config;
pub mod error;
pub mod guest;
pub mod handlers;
pub mod helpers;
pub mod journey;
pub mod leaderboard;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use auth::jwt::JwtConfig;
use auth::password::PasswordPolicy;
use cache::{create_redis_pool, CacheServices};
use config::HabitatConfig;
use middleware::{
    auth::{admin_auth_middleware, auth_middleware, cron_auth_middleware},
    metrics::metrics_middleware,
    rate_limit::{
        auth_rate_limit_middleware, guest_activation_rate_limit_middleware,
        rate_limit_middleware, RateLimitConfig, RateLimitState,
    },
    request_id::request_id_middleware,
};
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub rate_limit: RateLimitState,
    pub jwt_config: Arc<JwtConfig>,
    pub cache: CacheServices,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub rotate_refresh_tokens: bool,
    pub metrics: MetricsState,
    pub habitat: Arc<HabitatConfig>,
}

impl AppState {
    pub fn new(db_pool: DbPool, redis_pool: Option<deadpool_redis::Pool>, config: &Config) -> Self {
        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::with_config(
                RateLimitConfig::new(config.security.rate_limit_requests_per_minute, 60),
                RateLimitConfig::strict(),
                RateLimitConfig::guest_activation(
                    config.security.guest_activation_requests_per_minute,
                ),
            )
        } else {
            RateLimitState::disabled()
        };

        let jwt_config = JwtConfig::from_env_with_expiry(
            config.jwt.access_token_expiry_secs,
            config.jwt.refresh_token_expiry_secs,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );

        let redis_pool = redis_pool.or_else(|| create_redis_pool(&config.redis));
        let cache = CacheServices::new(redis_pool);

        let password_policy = PasswordPolicy::new(
            config.security.min_password_length,
            config.security.require_password_complexity,
        );

        let metrics = MetricsState::new(config.telemetry.metrics_enabled).unwrap_or_else(|e| {
            warn!(error = %e, "Prometheus recorder unavailable, metrics disabled");
            MetricsState::disabled()
        });

        Self {
            db_pool,
            rate_limit,
            jwt_config: Arc::new(jwt_config),
            cache,
            password_policy,
            password_hash_cost: config.security.password_hash_cost,
            rotate_refresh_tokens: config.security.rotate_refresh_tokens,
            metrics,
            habitat: Arc::new(config.habitat.clone()),
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let rate_limit_state = state.rate_limit.clone();

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .with_state(state.clone());

    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .layer(axum_middleware::from_fn(auth_rate_limit_middleware))
        .with_state(state.clone());

    let guest_routes = Router::new()
        .route(
            "/api/guest-access/activate",
            post(handlers::guest_access::activate),
        )
        .layer(axum_middleware::from_fn(
            guest_activation_rate_limit_middleware,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route("/api/guest-access/claim", post(handlers::guest_access::claim))
        .route(
            "/api/challenges/assign-random",
            post(handlers::challenges::assign_random),
        )
        .route(
            "/api/challenges/ngo",
            get(handlers::challenges::list_ngo_challenges),
        )
        .route(
            "/api/challenges/user",
            get(handlers::challenges::list_user_challenges)
                .post(handlers::challenges::join_ngo_challenge),
        )
        .route(
            "/api/challenges/user/{id}/progress",
            post(handlers::challenges::record_progress),
        )
        .route(
            "/api/species-journey",
            get(handlers::journey::get_journey).post(handlers::journey::start_journey),
        )
        .route(
            "/api/species-journey/history",
            get(handlers::journey::points_history),
        )
        .route("/api/species-avatars", get(handlers::journey::list_avatars))
        .route(
            "/api/leaderboard/naturalists",
            get(handlers::leaderboard::naturalists),
        )
        .route(
            "/api/observations",
            post(handlers::observations::create_observation),
        )
        .route(
            "/api/observations/map",
            get(handlers::observations::observation_map),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/api/guest-access/generate",
            post(handlers::campaigns::generate_campaign),
        )
        .route(
            "/api/guest-access/campaigns",
            get(handlers::campaigns::list_campaigns),
        )
        .route(
            "/api/guest-access/campaigns/{id}",
            get(handlers::campaigns::get_campaign).patch(handlers::campaigns::update_campaign),
        )
        .route(
            "/api/challenges/ngo",
            post(handlers::challenges::create_ngo_challenge),
        )
        .layer(axum_middleware::from_fn(admin_auth_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let cron_routes = Router::new()
        .route(
            "/api/cron/cleanup-guests",
            get(handlers::cron::cleanup_guests),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            cron_auth_middleware,
        ))
        .with_state(state);

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(auth_routes)
        .merge(guest_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(cron_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(rate_limit_state))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(error::ApiError::new("Not found", "NOT_FOUND")),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::{HeaderValue, Method};

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let origins = || -> Vec<HeaderValue> {
        config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect()
    };

    let cors = match (config.cors.allow_credentials, is_wildcard_origin) {
        // credentials forbid a literal `*`, so echo the caller's origin
        (true, true) => CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_credentials(true),
        (true, false) => CorsLayer::new()
            .allow_origin(origins())
            .allow_credentials(true),
        (false, true) => CorsLayer::new().allow_origin(Any),
        (false, false) => CorsLayer::new().allow_origin(origins()),
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn create_db_pool(config: &config::Config) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
}

pub fn create_db_pool_with_url(database_url: &str) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);

        config.cors.allow_credentials = true;
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://habitat.example".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}
