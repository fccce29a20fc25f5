//! Guest campaign administration (admin only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, is_unique_violation, log_db_error, ApiError, ApiResult, DbConn},
    guest::{
        codes::{generate_code, validate_custom_code},
        AccessTier,
    },
    helpers::{current_user_id, validate_payload},
    models::{GuestAccessCode, GuestAccessCodeChanges, NewGuestAccessCode},
    pagination::{PaginatedResponse, PaginationParams},
    schema::{guest_access_codes, guest_sessions},
    AppState,
};

const MAX_CODE_GENERATION_ATTEMPTS: usize = 5;

fn default_access_tier() -> String {
    AccessTier::Premium.as_str().to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateCampaignRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    #[schema(example = "Spring school fair")]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Destination path is required"))]
    #[schema(example = "/lessons")]
    pub destination_path: String,
    #[serde(default = "default_access_tier")]
    #[schema(example = "premium")]
    pub access_tier: String,
    #[validate(range(min = 1, max = 8760, message = "Duration must be 1-8760 hours"))]
    #[schema(example = 48)]
    pub duration_hours: i32,
    #[validate(range(min = 1, message = "max_uses must be at least 1"))]
    #[schema(example = 200)]
    pub max_uses: Option<i32>,
    pub expires_at: Option<NaiveDateTime>,
    #[validate(length(max = 120))]
    pub welcome_title: Option<String>,
    pub welcome_message: Option<String>,
    /// Custom code; a random one is generated when omitted.
    #[schema(example = "REEF-2025")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignCreatedResponse {
    pub campaign: GuestAccessCode,
    /// URL to encode in the QR code.
    #[schema(example = "https://habitat.app/guest?code=FOREST24")]
    pub activation_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CampaignStats {
    pub total_sessions: i64,
    pub active: i64,
    pub converted: i64,
    pub expired: i64,
    /// Converted sessions over total sessions, 0 when there are none.
    #[schema(example = 0.25)]
    pub conversion_rate: f64,
}

impl CampaignStats {
    pub fn from_status_counts<'a>(counts: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            stats.total_sessions += count;
            match status {
                "active" => stats.active += count,
                "converted" => stats.converted += count,
                "expired" => stats.expired += count,
                _ => {}
            }
        }
        if stats.total_sessions > 0 {
            stats.conversion_rate = stats.converted as f64 / stats.total_sessions as f64;
        }
        stats
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignWithStats {
    pub campaign: GuestAccessCode,
    pub stats: CampaignStats,
    pub activation_url: String,
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update. Nullable fields accept `null` to clear them.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub destination_path: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub max_uses: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<NaiveDateTime>)]
    pub expires_at: Option<Option<NaiveDateTime>>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub welcome_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub welcome_message: Option<Option<String>>,
}

fn check_destination_path(path: &str) -> ApiResult<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "destination_path must start with '/'",
            "INVALID_DESTINATION_PATH",
        ))
    }
}

/// Validates an update against the stored campaign and builds the changeset.
fn build_changes(
    current: &GuestAccessCode,
    payload: UpdateCampaignRequest,
    now: NaiveDateTime,
) -> ApiResult<GuestAccessCodeChanges> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() || name.len() > 120 {
            return Err(ApiError::bad_request(
                "Name must be 1-120 characters",
                "VALIDATION_ERROR",
            ));
        }
    }
    if let Some(path) = &payload.destination_path {
        check_destination_path(path)?;
    }
    if let Some(Some(max_uses)) = payload.max_uses {
        if max_uses < 1 {
            return Err(ApiError::bad_request(
                "max_uses must be at least 1",
                "VALIDATION_ERROR",
            ));
        }
        if max_uses < current.current_uses {
            return Err(ApiError::bad_request(
                format!(
                    "max_uses cannot be lower than current uses ({})",
                    current.current_uses
                ),
                "MAX_USES_BELOW_CURRENT",
            ));
        }
    }

    Ok(GuestAccessCodeChanges {
        name: payload.name,
        description: payload.description,
        destination_path: payload.destination_path,
        max_uses: payload.max_uses,
        expires_at: payload.expires_at,
        is_active: payload.is_active,
        welcome_title: payload.welcome_title,
        welcome_message: payload.welcome_message,
        updated_at: Some(now),
    })
}

fn load_stats(conn: &mut DbConn, code_ids: &[Uuid]) -> ApiResult<HashMap<Uuid, CampaignStats>> {
    let rows: Vec<(Uuid, String, i64)> = guest_sessions::table
        .filter(guest_sessions::code_id.eq_any(code_ids))
        .group_by((guest_sessions::code_id, guest_sessions::status))
        .select((
            guest_sessions::code_id,
            guest_sessions::status,
            diesel::dsl::count_star(),
        ))
        .load(conn)
        .map_err(log_db_error("load campaign stats"))?;

    let mut grouped: HashMap<Uuid, Vec<(String, i64)>> = HashMap::new();
    for (code_id, status, count) in rows {
        grouped.entry(code_id).or_default().push((status, count));
    }

    Ok(grouped
        .into_iter()
        .map(|(code_id, counts)| {
            let stats =
                CampaignStats::from_status_counts(counts.iter().map(|(s, c)| (s.as_str(), *c)));
            (code_id, stats)
        })
        .collect())
}

fn insert_campaign(
    conn: &mut DbConn,
    new_code: &NewGuestAccessCode,
) -> Result<GuestAccessCode, diesel::result::Error> {
    diesel::insert_into(guest_access_codes::table)
        .values(new_code)
        .get_result(conn)
}

/// Creates a guest campaign and returns the URL to print as a QR code.
#[utoipa::path(
    post,
    path = "/api/guest-access/generate",
    tag = "Guest Campaigns",
    request_body = GenerateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = CampaignCreatedResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 409, description = "Custom code already in use", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<CampaignCreatedResponse>)> {
    let admin_id = current_user_id(&claims)?;
    validate_payload(&payload)?;
    check_destination_path(&payload.destination_path)?;

    let tier = AccessTier::parse(&payload.access_tier).ok_or_else(|| {
        ApiError::bad_request(
            "access_tier must be 'premium' or 'basic'",
            "INVALID_ACCESS_TIER",
        )
    })?;

    let custom_code = payload
        .code
        .as_deref()
        .map(validate_custom_code)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string(), "INVALID_CODE_FORMAT"))?;

    let mut new_code = NewGuestAccessCode {
        code: String::new(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        destination_path: payload.destination_path,
        access_tier: tier.as_str().to_string(),
        duration_hours: payload.duration_hours,
        max_uses: payload.max_uses,
        expires_at: payload.expires_at,
        welcome_title: payload.welcome_title,
        welcome_message: payload.welcome_message,
        created_by: Some(admin_id),
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let campaign = match custom_code {
        Some(code) => {
            new_code.code = code;
            insert_campaign(&mut conn, &new_code).map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::conflict("This code is already in use", "CODE_TAKEN")
                } else {
                    log_db_error("create campaign")(e)
                }
            })?
        }
        None => {
            let mut created = None;
            for attempt in 1..=MAX_CODE_GENERATION_ATTEMPTS {
                new_code.code = generate_code(&mut rand::thread_rng());
                match insert_campaign(&mut conn, &new_code) {
                    Ok(campaign) => {
                        created = Some(campaign);
                        break;
                    }
                    Err(e) if is_unique_violation(&e) => {
                        warn!(attempt, "Generated guest code collided, retrying");
                    }
                    Err(e) => return Err(log_db_error("create campaign")(e)),
                }
            }
            created.ok_or_else(|| {
                ApiError::internal(
                    "Could not generate a unique code",
                    "CODE_GENERATION_FAILED",
                )
            })?
        }
    };

    let activation_url = state.habitat.activation_url(&campaign.code);

    info!(
        admin_id = %admin_id,
        campaign_id = %campaign.id,
        code = %campaign.code,
        access_tier = %campaign.access_tier,
        max_uses = ?campaign.max_uses,
        "Guest campaign created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CampaignCreatedResponse {
            campaign,
            activation_url,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/guest-access/campaigns",
    tag = "Guest Campaigns",
    params(PaginationParams),
    responses(
        (status = 200, description = "Campaigns, newest first", body = PaginatedResponse<CampaignWithStats>),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<CampaignWithStats>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = guest_access_codes::table
        .count()
        .get_result(&mut conn)
        .map_err(log_db_error("count campaigns"))?;

    let campaigns: Vec<GuestAccessCode> = guest_access_codes::table
        .order(guest_access_codes::created_at.desc())
        .limit(params.per_page())
        .offset(params.offset())
        .load(&mut conn)
        .map_err(log_db_error("list campaigns"))?;

    let ids: Vec<Uuid> = campaigns.iter().map(|c| c.id).collect();
    let mut stats = load_stats(&mut conn, &ids)?;

    let data = campaigns
        .into_iter()
        .map(|campaign| CampaignWithStats {
            stats: stats.remove(&campaign.id).unwrap_or_default(),
            activation_url: state.habitat.activation_url(&campaign.code),
            campaign,
        })
        .collect();

    Ok(Json(PaginatedResponse::from_params(
        data,
        &params,
        total_count,
    )))
}

fn find_campaign(conn: &mut DbConn, id: Uuid) -> ApiResult<GuestAccessCode> {
    guest_access_codes::table
        .find(id)
        .first(conn)
        .optional()
        .map_err(log_db_error("load campaign"))?
        .ok_or_else(|| ApiError::not_found("Campaign not found", "CAMPAIGN_NOT_FOUND"))
}

#[utoipa::path(
    get,
    path = "/api/guest-access/campaigns/{id}",
    tag = "Guest Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign with stats", body = CampaignWithStats),
        (status = 404, description = "Campaign not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CampaignWithStats>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let campaign = find_campaign(&mut conn, id)?;
    let stats = load_stats(&mut conn, &[id])?.remove(&id).unwrap_or_default();

    Ok(Json(CampaignWithStats {
        stats,
        activation_url: state.habitat.activation_url(&campaign.code),
        campaign,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/guest-access/campaigns/{id}",
    tag = "Guest Campaigns",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    request_body = UpdateCampaignRequest,
    responses(
        (status = 200, description = "Campaign updated", body = GuestAccessCode),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Campaign not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<GuestAccessCode>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let current = find_campaign(&mut conn, id)?;

    let now = Utc::now().naive_utc();
    let changes = build_changes(&current, payload, now)?;

    let updated: GuestAccessCode = diesel::update(guest_access_codes::table.find(id))
        .set(&changes)
        .get_result(&mut conn)
        .map_err(|e| match e {
            // A concurrent activation pushed current_uses past the new limit.
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::CheckViolation,
                _,
            ) => ApiError::bad_request(
                "max_uses cannot be lower than current uses",
                "MAX_USES_BELOW_CURRENT",
            ),
            e => log_db_error("update campaign")(e),
        })?;

    info!(
        admin_id = %claims.sub,
        campaign_id = %updated.id,
        is_active = updated.is_active,
        max_uses = ?updated.max_uses,
        "Guest campaign updated"
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(current_uses: i32) -> GuestAccessCode {
        let now = Utc::now().naive_utc();
        GuestAccessCode {
            id: Uuid::new_v4(),
            code: "FOREST24".to_string(),
            name: "Spring fair".to_string(),
            description: None,
            destination_path: "/lessons".to_string(),
            access_tier: "premium".to_string(),
            duration_hours: 48,
            max_uses: Some(100),
            current_uses,
            expires_at: None,
            is_active: true,
            welcome_title: None,
            welcome_message: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stats_from_counts() {
        let stats =
            CampaignStats::from_status_counts([("active", 5), ("converted", 3), ("expired", 2)]);
        assert_eq!(stats.total_sessions, 10);
        assert_eq!(stats.converted, 3);
        assert!((stats.conversion_rate - 0.3).abs() < f64::EPSILON);

        let empty = CampaignStats::from_status_counts(Vec::<(&str, i64)>::new());
        assert_eq!(empty.conversion_rate, 0.0);
    }

    #[test]
    fn test_max_uses_cannot_drop_below_current_uses() {
        let now = Utc::now().naive_utc();
        let payload = UpdateCampaignRequest {
            max_uses: Some(Some(4)),
            ..Default::default()
        };
        let (status, Json(body)) = build_changes(&campaign(5), payload, now).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "MAX_USES_BELOW_CURRENT");

        let payload = UpdateCampaignRequest {
            max_uses: Some(Some(5)),
            ..Default::default()
        };
        assert!(build_changes(&campaign(5), payload, now).is_ok());
    }

    #[test]
    fn test_destination_path_must_be_absolute() {
        let now = Utc::now().naive_utc();
        let payload = UpdateCampaignRequest {
            destination_path: Some("lessons".to_string()),
            ..Default::default()
        };
        assert!(build_changes(&campaign(0), payload, now).is_err());
    }

    #[test]
    fn test_null_clears_and_absent_keeps() {
        let payload: UpdateCampaignRequest =
            serde_json::from_str(r#"{"max_uses": null, "is_active": false}"#).unwrap();
        assert_eq!(payload.max_uses, Some(None));
        assert_eq!(payload.welcome_title, None);
        assert_eq!(payload.is_active, Some(false));
    }
}
