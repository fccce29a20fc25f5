//! Guest access handlers: QR code activation and conversion to a full account.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt::Claims, Role},
    error::{get_db_conn, is_unique_violation, log_db_error, ApiError, ApiResult},
    guest::{
        codes::{check_redeemable, normalize_code, rejection_after_race},
        detect_device_type, is_guest_email, AccessTier, GuestCredentials, RedemptionError,
    },
    handlers::auth::{hash_password, issue_tokens, AuthResponse, UserResponse},
    helpers::{client_ip, current_user_id, user_agent, validate_payload},
    models::{GuestAccessCode, GuestSession, NewGuestSession, NewUser, User},
    schema::{guest_access_codes, guest_sessions, refresh_tokens, users},
    telemetry::{record_guest_activation, record_guest_conversion},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ActivateRequest {
    #[validate(length(max = 64, message = "Code is too long"))]
    #[schema(example = "FOREST24")]
    pub code: String,
    #[validate(length(max = 32, message = "Device type is too long"))]
    #[schema(example = "mobile")]
    pub device_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestCredentialsResponse {
    #[schema(example = "guest_1f2e3d4c5b6a7980@habitat.guest")]
    pub email: String,
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestSessionInfo {
    pub id: Uuid,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignInfo {
    #[schema(example = "/lessons")]
    pub destination_path: String,
    #[schema(example = "premium")]
    pub access_tier: String,
    #[schema(example = 48)]
    pub duration_hours: i32,
    pub welcome_title: Option<String>,
    pub welcome_message: Option<String>,
}

impl From<&GuestAccessCode> for CampaignInfo {
    fn from(code: &GuestAccessCode) -> Self {
        Self {
            destination_path: code.destination_path.clone(),
            access_tier: code.access_tier.clone(),
            duration_hours: code.duration_hours,
            welcome_title: code.welcome_title.clone(),
            welcome_message: code.welcome_message.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivateResponse {
    pub user: UserResponse,
    /// Shown once; the client needs them to sign back in as the guest.
    pub credentials: GuestCredentialsResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub session: GuestSessionInfo,
    pub campaign: CampaignInfo,
}

#[derive(Debug, thiserror::Error)]
enum ActivationError {
    #[error(transparent)]
    Redemption(#[from] RedemptionError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

fn redemption_response(e: RedemptionError) -> (StatusCode, Json<ApiError>) {
    match e {
        RedemptionError::NotFound => ApiError::not_found(e.to_string(), e.code()),
        _ => ApiError::gone(e.to_string(), e.code()),
    }
}

/// Redeems a guest code and creates a temporary guest account.
///
/// Consuming the use, creating the user and recording the session happen in
/// one transaction; a failure anywhere leaves the code's use count untouched.
#[utoipa::path(
    post,
    path = "/api/guest-access/activate",
    tag = "Guest Access",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Guest account created", body = ActivateResponse),
        (status = 400, description = "Missing code", body = ApiError),
        (status = 404, description = "Unknown code", body = ApiError),
        (status = 410, description = "Code inactive, expired or exhausted", body = ApiError),
        (status = 429, description = "Rate limited"),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn activate(
    State(state): State<AppState>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(payload): Json<ActivateRequest>,
) -> ApiResult<Json<ActivateResponse>> {
    validate_payload(&payload)?;

    let code = normalize_code(&payload.code)
        .ok_or_else(|| ApiError::bad_request("Code is required", "CODE_REQUIRED"))?;

    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    let campaign: GuestAccessCode = guest_access_codes::table
        .filter(guest_access_codes::code.eq(&code))
        .first(&mut conn)
        .optional()
        .map_err(log_db_error("load guest code"))?
        .ok_or_else(|| {
            warn!(code = %code, "Activation with unknown guest code");
            record_guest_activation(RedemptionError::NotFound.outcome());
            redemption_response(RedemptionError::NotFound)
        })?;

    if let Err(e) = check_redeemable(&campaign, now) {
        warn!(code = %code, reason = e.outcome(), "Guest code rejected");
        record_guest_activation(e.outcome());
        return Err(redemption_response(e));
    }

    // Hashing is slow; keep it outside the transaction.
    let credentials =
        GuestCredentials::generate(&mut rand::thread_rng(), &state.habitat.guest_email_domain);
    let password_hash = hash_password(&state, &credentials.password)?;

    let is_premium = AccessTier::parse(&campaign.access_tier) == Some(AccessTier::Premium);
    let premium_until = now + Duration::hours(i64::from(campaign.duration_hours));
    let user_agent = user_agent(&headers);
    let device_type = payload
        .device_type
        .filter(|d| !d.trim().is_empty())
        .or_else(|| user_agent.as_deref().map(|ua| detect_device_type(ua).to_string()));
    let ip_address = client_ip(&headers, connect_info.map(|Extension(ConnectInfo(addr))| addr));

    let result = conn.transaction::<_, ActivationError, _>(|conn| {
        let consumed = diesel::update(
            guest_access_codes::table
                .filter(guest_access_codes::id.eq(campaign.id))
                .filter(guest_access_codes::is_active.eq(true))
                .filter(
                    guest_access_codes::expires_at
                        .is_null()
                        .or(guest_access_codes::expires_at.assume_not_null().gt(now)),
                )
                .filter(
                    guest_access_codes::max_uses.is_null().or(guest_access_codes::current_uses
                        .lt(guest_access_codes::max_uses.assume_not_null())),
                ),
        )
        .set((
            guest_access_codes::current_uses.eq(guest_access_codes::current_uses + 1),
            guest_access_codes::updated_at.eq(now),
        ))
        .get_result::<GuestAccessCode>(conn)
        .optional()?;

        // The code changed between the check and the update.
        let consumed = match consumed {
            Some(code) => code,
            None => {
                let current: Option<GuestAccessCode> = guest_access_codes::table
                    .find(campaign.id)
                    .first(conn)
                    .optional()?;
                return Err(rejection_after_race(current.as_ref(), now).into());
            }
        };

        let user: User = diesel::insert_into(users::table)
            .values(&NewUser {
                email: credentials.email.clone(),
                password_hash,
                full_name: None,
                role: Role::Guest.as_str().to_string(),
                is_premium,
                premium_until: Some(premium_until),
            })
            .get_result(conn)?;

        let session: GuestSession = diesel::insert_into(guest_sessions::table)
            .values(&NewGuestSession {
                user_id: user.id,
                code_id: consumed.id,
                ip_address,
                user_agent,
                device_type,
                expires_at: premium_until,
            })
            .get_result(conn)?;

        Ok((consumed, user, session))
    });

    let (consumed, user, session) = match result {
        Ok(created) => created,
        Err(ActivationError::Redemption(e)) => {
            warn!(code = %code, reason = e.outcome(), "Guest code changed during activation");
            record_guest_activation(e.outcome());
            return Err(redemption_response(e));
        }
        Err(ActivationError::Database(e)) => {
            record_guest_activation("error");
            return Err(log_db_error("activate guest code")(e));
        }
    };

    let (access_token, refresh_token) = issue_tokens(&state.jwt_config, &mut conn, &user)?;

    record_guest_activation("success");
    info!(
        user_id = %user.id,
        code_id = %consumed.id,
        session_id = %session.id,
        uses = consumed.current_uses,
        max_uses = ?consumed.max_uses,
        "Guest code activated"
    );

    Ok(Json(ActivateResponse {
        user: user.into(),
        credentials: GuestCredentialsResponse {
            email: credentials.email,
            password: credentials.password,
        },
        access_token,
        refresh_token,
        session: GuestSessionInfo {
            id: session.id,
            expires_at: session.expires_at,
        },
        campaign: CampaignInfo::from(&consumed),
    }))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ClaimRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Otters4ever")]
    pub password: String,
    #[validate(length(max = 120, message = "Name is too long"))]
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum ClaimError {
    #[error("account is not a guest")]
    NotAGuest,
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Converts the calling guest into a regular account in place.
///
/// The user id, journey, points and challenges carry over; only the
/// credentials and role change. Premium granted by the code is kept until it
/// lapses.
#[utoipa::path(
    post,
    path = "/api/guest-access/claim",
    tag = "Guest Access",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Account claimed", body = AuthResponse),
        (status = 400, description = "Validation error or reserved guest address", body = ApiError),
        (status = 403, description = "Caller is not a guest", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ClaimRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user_id = current_user_id(&claims)?;

    if !claims.is_guest() {
        return Err(ApiError::forbidden(
            "Only guest accounts can be claimed",
            "NOT_A_GUEST",
        ));
    }

    validate_payload(&payload)?;
    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let email = payload.email.trim().to_lowercase();
    if is_guest_email(&email, &state.habitat.guest_email_domain) {
        warn!(user_id = %user_id, "Claim with reserved guest address");
        return Err(ApiError::bad_request(
            "This address is reserved for guest accounts",
            "RESERVED_EMAIL",
        ));
    }

    let password_hash = hash_password(&state, &payload.password)?;
    let now = Utc::now().naive_utc();

    let mut conn = get_db_conn(&state.db_pool)?;

    let result = conn.transaction::<_, ClaimError, _>(|conn| {
        let user: User = diesel::update(
            users::table
                .filter(users::id.eq(user_id))
                .filter(users::role.eq(Role::Guest.as_str()))
                .filter(users::is_active.eq(true)),
        )
        .set((
            users::email.eq(&email),
            users::password_hash.eq(&password_hash),
            users::full_name.eq(payload.full_name.as_deref()),
            users::role.eq(Role::User.as_str()),
            users::updated_at.eq(now),
        ))
        .get_result(conn)
        .optional()
        .map_err(|e| {
            if is_unique_violation(&e) {
                ClaimError::EmailTaken
            } else {
                ClaimError::Database(e)
            }
        })?
        .ok_or(ClaimError::NotAGuest)?;

        let converted = diesel::update(
            guest_sessions::table
                .filter(guest_sessions::user_id.eq(user_id))
                .filter(guest_sessions::status.eq("active")),
        )
        .set((
            guest_sessions::status.eq("converted"),
            guest_sessions::converted_at.eq(now),
        ))
        .execute(conn)?;

        diesel::delete(refresh_tokens::table.filter(refresh_tokens::user_id.eq(user_id)))
            .execute(conn)?;

        Ok((user, converted))
    });

    let (user, converted_sessions) = match result {
        Ok(claimed) => claimed,
        Err(ClaimError::NotAGuest) => {
            warn!(user_id = %user_id, "Claim for a non-guest or deactivated account");
            return Err(ApiError::forbidden(
                "Only active guest accounts can be claimed",
                "NOT_A_GUEST",
            ));
        }
        Err(ClaimError::EmailTaken) => {
            return Err(ApiError::conflict(
                "An account with this email already exists",
                "EMAIL_TAKEN",
            ));
        }
        Err(ClaimError::Database(e)) => return Err(log_db_error("claim guest account")(e)),
    };

    // Outstanding guest-role access tokens must stop working.
    if let Err(e) = state
        .cache
        .token_revocation
        .revoke_all_user_tokens(user.id, state.jwt_config.access_token_expiry as u64)
        .await
    {
        warn!(user_id = %user.id, error = %e, "Could not revoke guest access tokens");
    }

    let (access_token, refresh_token) = issue_tokens(&state.jwt_config, &mut conn, &user)?;

    record_guest_conversion();
    info!(user_id = %user.id, converted_sessions, "Guest account claimed");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redemption_status_codes() {
        assert_eq!(
            redemption_response(RedemptionError::NotFound).0,
            StatusCode::NOT_FOUND
        );
        for e in [
            RedemptionError::Inactive,
            RedemptionError::Expired,
            RedemptionError::Exhausted,
        ] {
            let (status, Json(body)) = redemption_response(e);
            assert_eq!(status, StatusCode::GONE);
            assert_eq!(body.code, e.code());
        }
    }
}
