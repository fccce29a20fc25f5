//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt::{Claims, JwtConfig},
        password::PasswordService,
        Role,
    },
    error::{get_db_conn, is_unique_violation, log_db_error, ApiError, ApiResult},
    guest::is_guest_email,
    helpers::{current_user_id, validate_payload},
    models::{NewRefreshToken, NewUser, User},
    schema::{refresh_tokens, users},
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Otters4ever", min_length = 8)]
    pub password: String,
    #[validate(length(max = 120, message = "Name is too long"))]
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Otters4ever")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
    #[schema(example = "User")]
    pub role: String,
    /// Effective premium status: false once `premium_until` has passed.
    pub is_premium: bool,
    pub premium_until: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let is_premium = user.has_active_premium(Utc::now().naive_utc());
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_premium,
            premium_until: user.premium_until,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn store_refresh_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    expires_in_secs: i64,
) -> Result<(), diesel::result::Error> {
    let expires_at = (Utc::now() + Duration::seconds(expires_in_secs)).naive_utc();

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            user_id,
            token_hash: hash_token(token),
            expires_at,
        })
        .execute(conn)?;

    Ok(())
}

fn verify_stored_token(conn: &mut PgConnection, token: &str) -> Result<Uuid, &'static str> {
    let token_hash = hash_token(token);
    let now = Utc::now().naive_utc();

    let stored: Option<(Uuid, NaiveDateTime)> = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .select((refresh_tokens::user_id, refresh_tokens::expires_at))
        .first(conn)
        .optional()
        .map_err(|_| "Invalid refresh token")?;

    match stored {
        Some((user_id, expires_at)) if expires_at >= now => Ok(user_id),
        Some(_) => {
            let _ = diesel::delete(
                refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)),
            )
            .execute(conn);
            Err("Refresh token has expired")
        }
        None => Err("Invalid refresh token"),
    }
}

fn invalidate_token(conn: &mut PgConnection, token: &str) -> Result<usize, diesel::result::Error> {
    diesel::delete(refresh_tokens::table.filter(refresh_tokens::token_hash.eq(hash_token(token))))
        .execute(conn)
}

fn cleanup_expired_tokens(conn: &mut PgConnection, user_id: Uuid) {
    let now = Utc::now().naive_utc();
    let result = diesel::delete(
        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::expires_at.lt(now)),
    )
    .execute(conn);

    if let Ok(count) = result {
        if count > 0 {
            info!(user_id = %user_id, deleted_count = count, "Cleaned up expired refresh tokens");
        }
    }
}

pub(crate) fn user_role(user: &User) -> ApiResult<Role> {
    user.role.parse().map_err(|e| {
        error!(user_id = %user.id, error = %e, "Stored user role is invalid");
        ApiError::internal("Invalid account role", "INVALID_ROLE")
    })
}

fn access_token_for(jwt_config: &JwtConfig, user: &User) -> ApiResult<String> {
    jwt_config
        .generate_access_token(user.id, &user.email, user_role(user)?)
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
        })
}

/// Issues an access/refresh pair and persists the refresh token hash.
pub(crate) fn issue_tokens(
    jwt_config: &JwtConfig,
    conn: &mut PgConnection,
    user: &User,
) -> ApiResult<(String, String)> {
    let access_token = access_token_for(jwt_config, user)?;

    let refresh_token = jwt_config.generate_refresh_token(user.id).map_err(|e| {
        error!(error = %e, "Token generation failed");
        ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
    })?;

    store_refresh_token(conn, user.id, &refresh_token, jwt_config.refresh_token_expiry).map_err(
        |e| {
            error!(error = %e, "Failed to store refresh token");
            ApiError::internal("Token storage failed", "TOKEN_STORAGE_ERROR")
        },
    )?;

    Ok((access_token, refresh_token))
}

pub(crate) fn hash_password(state: &AppState, password: &str) -> ApiResult<String> {
    PasswordService::hash_password_with_cost(password, state.password_hash_cost).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Validation error or reserved guest address", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_payload(&payload)?;

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let email = payload.email.trim().to_lowercase();
    if is_guest_email(&email, &state.habitat.guest_email_domain) {
        warn!(email = %email, "Registration with reserved guest address");
        return Err(ApiError::bad_request(
            "This address is reserved for guest accounts",
            "RESERVED_EMAIL",
        ));
    }

    let new_user = NewUser {
        email,
        password_hash: hash_password(&state, &payload.password)?,
        full_name: payload.full_name,
        role: Role::User.as_str().to_string(),
        is_premium: false,
        premium_until: None,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!(email = %new_user.email, "Registration with existing email");
                ApiError::conflict("User with this email already exists", "USER_EXISTS")
            } else {
                log_db_error("register user")(e)
            }
        })?;

    let (access_token, refresh_token) = issue_tokens(&state.jwt_config, &mut conn, &user)?;

    info!(user_id = %user.id, "User registered");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

/// Signs in regular accounts and guests using their generated credentials.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "Account inactive", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_payload(&payload)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.trim().to_lowercase()))
        .first(&mut conn)
        .optional()
        .map_err(log_db_error("login lookup"))?
        .ok_or_else(|| {
            record_auth_attempt("login", AuthOutcome::InvalidCredentials);
            ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    let is_valid = PasswordService::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt");
        record_auth_attempt("login", AuthOutcome::InvalidCredentials);
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    if !user.is_active {
        warn!(user_id = %user.id, role = %user.role, "Login attempt for inactive user");
        record_auth_attempt("login", AuthOutcome::AccountInactive);
        return Err(ApiError::forbidden(
            "Account is inactive",
            "ACCOUNT_INACTIVE",
        ));
    }

    cleanup_expired_tokens(&mut conn, user.id);

    let (access_token, refresh_token) = issue_tokens(&state.jwt_config, &mut conn, &user)?;

    record_auth_attempt("login", AuthOutcome::Success);
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ApiError),
        (status = 403, description = "User account is inactive", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let refresh_claims = state
        .jwt_config
        .verify_refresh_token(&payload.refresh_token)
        .map_err(|_| {
            record_auth_attempt("refresh", AuthOutcome::TokenExpired);
            ApiError::unauthorized("Invalid or expired refresh token", "INVALID_REFRESH_TOKEN")
        })?;

    let user_id = Uuid::parse_str(&refresh_claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token format", "INVALID_TOKEN_FORMAT"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let stored_user_id = verify_stored_token(&mut conn, &payload.refresh_token).map_err(|msg| {
        warn!(user_id = %user_id, "Refresh token not found in database");
        ApiError::unauthorized(msg, "INVALID_REFRESH_TOKEN")
    })?;

    if stored_user_id != user_id {
        warn!(claimed_user_id = %user_id, stored_user_id = %stored_user_id, "Refresh token user mismatch");
        return Err(ApiError::unauthorized(
            "Invalid refresh token",
            "TOKEN_USER_MISMATCH",
        ));
    }

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .map_err(|_| ApiError::unauthorized("User not found", "USER_NOT_FOUND"))?;

    if !user.is_active {
        record_auth_attempt("refresh", AuthOutcome::AccountInactive);
        return Err(ApiError::forbidden(
            "User account is inactive",
            "ACCOUNT_INACTIVE",
        ));
    }

    if state.rotate_refresh_tokens {
        invalidate_token(&mut conn, &payload.refresh_token).map_err(|e| {
            error!(error = %e, "Failed to invalidate old refresh token");
            ApiError::internal("Token invalidation failed", "TOKEN_INVALIDATION_ERROR")
        })?;

        let (access_token, refresh_token) = issue_tokens(&state.jwt_config, &mut conn, &user)?;

        info!(user_id = %user.id, "Tokens refreshed (rotated)");

        Ok(Json(RefreshResponse {
            access_token,
            refresh_token,
        }))
    } else {
        let access_token = access_token_for(&state.jwt_config, &user)?;

        info!(user_id = %user.id, "Access token refreshed");

        Ok(Json(RefreshResponse {
            access_token,
            refresh_token: payload.refresh_token,
        }))
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let deleted = invalidate_token(&mut conn, &payload.refresh_token)
        .map_err(log_db_error("logout"))?;
    info!(tokens_deleted = deleted, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = current_user_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()
        .map_err(log_db_error("load current user"))?
        .ok_or_else(|| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    Ok(Json(user.into()))
}
