//! Redis-backed shared state.

pub mod token_revocation;

use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RedisConfig;

pub use token_revocation::{RevocationError, TokenRevocationList};

pub fn create_redis_pool(config: &RedisConfig) -> Option<Pool> {
    let url = config.url.as_ref()?;

    let timeout = std::time::Duration::from_secs(config.connection_timeout_secs);
    let pool = RedisPoolConfig::from_url(url).builder().ok().and_then(|b| {
        b.max_size(config.pool_size)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .ok()
    });

    // Only the host part is logged; the URL may carry credentials.
    let host = url.split('@').next_back().unwrap_or("***");
    match &pool {
        Some(_) => info!(redis_host = %host, "Redis pool created"),
        None => warn!(redis_host = %host, "Redis pool could not be created, revocation disabled"),
    }

    pool
}

#[derive(Clone)]
pub struct CacheServices {
    pub token_revocation: Arc<TokenRevocationList>,
}

impl CacheServices {
    pub fn new(redis_pool: Option<Pool>) -> Self {
        Self {
            token_revocation: Arc::new(TokenRevocationList::new(redis_pool)),
        }
    }
}
