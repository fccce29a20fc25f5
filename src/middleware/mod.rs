//! Request middleware.

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use auth::{admin_auth_middleware, auth_middleware, cron_auth_middleware};
pub use metrics::metrics_middleware;
pub use rate_limit::{
    auth_rate_limit_middleware, guest_activation_rate_limit_middleware, rate_limit_middleware,
    RateLimitConfig, RateLimitState,
};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
