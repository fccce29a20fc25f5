//! Authentication and authorization middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use tracing::{warn, Span};

use crate::auth::jwt::Claims;
use crate::error::ApiError;
use crate::telemetry::{record_auth_attempt, AuthOutcome};
use crate::AppState;

fn bearer_token(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized("Missing authorization header", "MISSING_AUTH_HEADER")
                .into_response()
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::unauthorized("Invalid authorization header format", "INVALID_AUTH_FORMAT")
            .into_response()
    })
}

/// Validates JWT access tokens and stores claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&req)?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|_| {
        record_auth_attempt("access", AuthOutcome::TokenExpired);
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    let user_id = claims.user_id().ok_or_else(|| {
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    if state
        .cache
        .token_revocation
        .is_user_token_revoked(user_id, claims.iat)
        .await
    {
        record_auth_attempt("access", AuthOutcome::TokenRevoked);
        return Err(
            ApiError::unauthorized("Token has been revoked", "TOKEN_REVOKED").into_response(),
        );
    }

    Span::current().record("user_id", tracing::field::display(user_id));

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Requires the `Admin` role. Must run after [`auth_middleware`].
pub async fn admin_auth_middleware(req: Request, next: Next) -> Result<Response, Response> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => Ok(next.run(req).await),
        Some(claims) => {
            warn!(user_id = %claims.sub, role = %claims.role, "Admin route denied");
            Err(ApiError::forbidden("Admin role required", "ADMIN_REQUIRED").into_response())
        }
        None => Err(ApiError::unauthorized("Authentication required", "MISSING_AUTH_HEADER")
            .into_response()),
    }
}

/// Guards cron routes with the static `CRON_SECRET` bearer token.
///
/// The routes are disabled (503) when no secret is configured.
pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(secret) = state.habitat.cron_secret.as_deref() else {
        return Err(
            ApiError::unavailable("Cron routes are disabled", "CRON_DISABLED").into_response(),
        );
    };

    let token = bearer_token(&req)?;
    if !secrets_match(token, secret) {
        warn!("Cron request with invalid secret");
        return Err(ApiError::unauthorized("Invalid cron secret", "INVALID_CRON_SECRET")
            .into_response());
    }

    Ok(next.run(req).await)
}

/// Compares fixed-length digests so the comparison time does not depend on
/// how long a matching prefix is.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cret "));
        assert!(!secrets_match("", "s3cret"));
    }
}
