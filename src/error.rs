//! Shared error handling utilities.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::DbPool;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[schema(example = "Guest code has reached its usage limit")]
    pub error: String,
    #[schema(example = "CODE_EXHAUSTED")]
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn with_status(
        status: StatusCode,
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (status, Json(Self::new(error, code)))
    }

    pub fn bad_request(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::BAD_REQUEST, error, code)
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::UNAUTHORIZED, error, code)
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::FORBIDDEN, error, code)
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::NOT_FOUND, error, code)
    }

    pub fn conflict(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::CONFLICT, error, code)
    }

    /// Used for guest codes that existed but can no longer be redeemed.
    pub fn gone(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::GONE, error, code)
    }

    pub fn unavailable(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, error, code)
    }

    pub fn internal(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error, code)
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error", "DB_ERROR")
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub type DbConn =
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>;

pub fn get_db_conn(pool: &DbPool) -> Result<DbConn, (StatusCode, Json<ApiError>)> {
    pool.get().map_err(|e| {
        error!(error = %e, "Database connection error");
        ApiError::internal("Database connection error", "DB_CONNECTION_ERROR")
    })
}

/// Logs a Diesel error with context and maps it to a generic 500.
pub fn log_db_error(
    context: &'static str,
) -> impl FnOnce(diesel::result::Error) -> (StatusCode, Json<ApiError>) {
    move |e| {
        error!(error = %e, context, "Database query failed");
        ApiError::db_error()
    }
}

pub fn is_unique_violation(e: &diesel::result::Error) -> bool {
    matches!(
        e,
        diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    )
}
