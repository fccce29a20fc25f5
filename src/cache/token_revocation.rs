//! Access token revocation list.
//!
//! Access tokens are stateless, so a deactivated guest could keep using one
//! until it expires. Cleanup, claim and logout record a per-user cutoff here;
//! tokens issued before the cutoff are rejected by the auth middleware.

use deadpool_redis::Pool;
use redis::AsyncCommands;
use tracing::{debug, error};
use uuid::Uuid;

const REVOKED_USER_PREFIX: &str = "habitat:revoked:user:";

#[derive(Clone)]
pub struct TokenRevocationList {
    pool: Option<Pool>,
}

impl TokenRevocationList {
    pub fn new(pool: Option<Pool>) -> Self {
        Self { pool }
    }

    fn user_key(user_id: Uuid) -> String {
        format!("{}{}", REVOKED_USER_PREFIX, user_id)
    }

    /// Rejects every access token for `user_id` issued before now.
    ///
    /// `ttl_secs` should be at least the access token lifetime; after that
    /// every older token has expired on its own.
    pub async fn revoke_all_user_tokens(
        &self,
        user_id: Uuid,
        ttl_secs: u64,
    ) -> Result<(), RevocationError> {
        let pool = self.pool.as_ref().ok_or(RevocationError::NoRedis)?;
        let mut conn = pool.get().await.map_err(|e| {
            error!(error = %e, "Failed to get Redis connection");
            RevocationError::ConnectionFailed
        })?;

        let revoked_at = chrono::Utc::now().timestamp();
        conn.set_ex::<_, _, ()>(Self::user_key(user_id), revoked_at, ttl_secs)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to revoke user tokens");
                RevocationError::OperationFailed
            })?;

        debug!(user_id = %user_id, ttl_secs, "User tokens revoked");
        Ok(())
    }

    /// Fails open when Redis is absent or unreachable.
    pub async fn is_user_token_revoked(&self, user_id: Uuid, token_iat: i64) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        let Ok(mut conn) = pool.get().await else {
            return false;
        };

        let revoked_at: Option<i64> = conn.get(Self::user_key(user_id)).await.ok().flatten();
        is_revoked_at(revoked_at, token_iat)
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }
}

/// Tokens issued in the same second as the cutoff stay valid so that tokens
/// minted right after a claim are accepted.
fn is_revoked_at(revoked_at: Option<i64>, token_iat: i64) -> bool {
    revoked_at.is_some_and(|ts| token_iat < ts)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RevocationError {
    #[error("Redis not configured")]
    NoRedis,
    #[error("Redis connection failed")]
    ConnectionFailed,
    #[error("Redis operation failed")]
    OperationFailed,
}
