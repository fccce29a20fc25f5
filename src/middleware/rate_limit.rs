//! Per-IP rate limiting middleware using governor.
//!
//! Three independent budgets: a global one for every route, a stricter one
//! for the credential endpoints under `/api/auth`, and the strictest for guest
//! code activation, which is the only public route that creates accounts.

use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use serde::Serialize;
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

pub type KeyedRateLimiter =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub enabled: bool,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, 60)
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_secs,
            enabled: true,
            burst_size: requests_per_window / 2,
        }
    }

    pub fn strict() -> Self {
        Self {
            requests_per_window: 20,
            window_secs: 60,
            enabled: true,
            burst_size: 10,
        }
    }

    /// Guest activation budget. The burst equals the per-minute allowance so
    /// a classroom sharing one NAT address can scan a code together.
    pub fn guest_activation(requests_per_minute: u32) -> Self {
        Self {
            requests_per_window: requests_per_minute,
            window_secs: 60,
            enabled: true,
            burst_size: requests_per_minute,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn create_limiter(&self) -> Option<Arc<KeyedRateLimiter>> {
        if !self.enabled || self.requests_per_window == 0 {
            return None;
        }

        // e.g. 60 req / 60s = 1 token per second
        let replenish_interval_ns =
            (self.window_secs as u128 * 1_000_000_000) / self.requests_per_window as u128;
        let replenish_interval = Duration::from_nanos(replenish_interval_ns as u64);

        let burst = NonZeroU32::new(self.burst_size.max(1))?;
        let quota = Quota::with_period(replenish_interval)?.allow_burst(burst);

        Some(Arc::new(RateLimiter::dashmap(quota)))
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub global_limiter: Option<Arc<KeyedRateLimiter>>,
    pub auth_limiter: Option<Arc<KeyedRateLimiter>>,
    pub guest_limiter: Option<Arc<KeyedRateLimiter>>,
    pub config: RateLimitConfig,
}

impl RateLimitState {
    pub fn with_config(
        global_config: RateLimitConfig,
        auth_config: RateLimitConfig,
        guest_config: RateLimitConfig,
    ) -> Self {
        Self {
            global_limiter: global_config.create_limiter(),
            auth_limiter: auth_config.create_limiter(),
            guest_limiter: guest_config.create_limiter(),
            config: global_config,
        }
    }

    pub fn disabled() -> Self {
        Self {
            global_limiter: None,
            auth_limiter: None,
            guest_limiter: None,
            config: RateLimitConfig::disabled(),
        }
    }

    fn limiter(&self, bucket: Bucket) -> Option<&Arc<KeyedRateLimiter>> {
        match bucket {
            Bucket::Global => self.global_limiter.as_ref(),
            Bucket::Auth => self.auth_limiter.as_ref(),
            Bucket::GuestActivation => self.guest_limiter.as_ref(),
        }
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::with_config(
            RateLimitConfig::default(),
            RateLimitConfig::strict(),
            RateLimitConfig::guest_activation(10),
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Global,
    Auth,
    GuestActivation,
}

impl Bucket {
    fn message(&self) -> &'static str {
        match self {
            Bucket::Global => "Too many requests",
            Bucket::Auth => "Too many authentication attempts",
            Bucket::GuestActivation => "Too many guest code activations",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitExceeded {
    pub error: String,
    pub code: &'static str,
    pub retry_after_secs: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after = HeaderValue::from(self.retry_after_secs);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, retry_after.clone());
        response
            .headers_mut()
            .insert("X-RateLimit-Reset", retry_after);
        response
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

async fn check_bucket(
    bucket: Bucket,
    rate_limit_state: Option<Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let Some(Extension(state)) = rate_limit_state else {
        return Ok(next.run(request).await);
    };
    let Some(limiter) = state.limiter(bucket) else {
        return Ok(next.run(request).await);
    };

    let ip = client_ip(&request);

    match limiter.check_key(&ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &state.config);
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);

            warn!(ip = %ip, bucket = ?bucket, retry_after_secs = retry_after, "Rate limit exceeded");

            Err(RateLimitExceeded {
                error: bucket.message().to_string(),
                code: "RATE_LIMITED",
                retry_after_secs: retry_after,
            })
        }
    }
}

pub async fn rate_limit_middleware(
    rate_limit_state: Option<Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    check_bucket(Bucket::Global, rate_limit_state, request, next).await
}

pub async fn auth_rate_limit_middleware(
    rate_limit_state: Option<Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    check_bucket(Bucket::Auth, rate_limit_state, request, next).await
}

pub async fn guest_activation_rate_limit_middleware(
    rate_limit_state: Option<Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    check_bucket(Bucket::GuestActivation, rate_limit_state, request, next).await
}

fn add_rate_limit_headers(response: &mut Response, config: &RateLimitConfig) {
    response.headers_mut().insert(
        "X-RateLimit-Limit",
        HeaderValue::from(config.requests_per_window),
    );
}
