//! Challenge handlers: random assignment, NGO opt-ins and progress.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    challenges::{apply_progress, expire_stale, pick_weighted, ChallengeKind, ChallengeStatus},
    error::{get_db_conn, is_unique_violation, log_db_error, ApiError, ApiResult, DbConn},
    helpers::{current_user_id, validate_payload},
    journey::{award_points, LedgerError, PointsAward, PointsSource},
    models::{
        NewNgoChallenge, NewUserActiveChallenge, NgoChallenge, UnpredictableChallenge,
        UserActiveChallenge,
    },
    schema::{ngo_challenges, unpredictable_challenges, user_active_challenges},
    telemetry::record_challenge_assignment,
    AppState,
};

/// Title and reward of whichever template an assignment points at.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeTemplateInfo {
    pub id: Uuid,
    #[schema(example = "Spot three birds")]
    pub title: String,
    pub description: String,
    #[schema(example = 25)]
    pub points_reward: i32,
    /// Set for unpredictable challenges.
    #[schema(example = "observation")]
    pub challenge_type: Option<String>,
    /// Set for NGO challenges.
    #[schema(example = "Ocean Guardians")]
    pub ngo_name: Option<String>,
    pub logo_url: Option<String>,
}

impl From<UnpredictableChallenge> for ChallengeTemplateInfo {
    fn from(t: UnpredictableChallenge) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            points_reward: t.points_reward,
            challenge_type: Some(t.challenge_type),
            ngo_name: None,
            logo_url: None,
        }
    }
}

impl From<NgoChallenge> for ChallengeTemplateInfo {
    fn from(t: NgoChallenge) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            points_reward: t.points_reward,
            challenge_type: None,
            ngo_name: Some(t.ngo_name),
            logo_url: t.logo_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserChallengeView {
    pub id: Uuid,
    #[schema(example = "unpredictable")]
    pub challenge_kind: String,
    pub progress: i32,
    pub target: i32,
    #[schema(example = "active")]
    pub status: String,
    pub started_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub template: Option<ChallengeTemplateInfo>,
}

impl UserChallengeView {
    fn new(row: UserActiveChallenge, template: Option<ChallengeTemplateInfo>) -> Self {
        Self {
            id: row.id,
            challenge_kind: row.challenge_kind,
            progress: row.progress,
            target: row.target,
            status: row.status,
            started_at: row.started_at,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
            template,
        }
    }
}

type ChallengeRow = (
    UserActiveChallenge,
    Option<NgoChallenge>,
    Option<UnpredictableChallenge>,
);

fn into_view((row, ngo, unpredictable): ChallengeRow) -> UserChallengeView {
    let template = ngo
        .map(ChallengeTemplateInfo::from)
        .or_else(|| unpredictable.map(ChallengeTemplateInfo::from));
    UserChallengeView::new(row, template)
}

#[derive(Debug, Default)]
struct ChallengeFilter {
    id: Option<Uuid>,
    status: Option<ChallengeStatus>,
    kind: Option<ChallengeKind>,
}

fn load_views(
    conn: &mut DbConn,
    user_id: Uuid,
    filter: ChallengeFilter,
) -> QueryResult<Vec<UserChallengeView>> {
    let mut query = user_active_challenges::table
        .left_join(ngo_challenges::table)
        .left_join(unpredictable_challenges::table)
        .filter(user_active_challenges::user_id.eq(user_id))
        .select((
            user_active_challenges::all_columns,
            ngo_challenges::all_columns.nullable(),
            unpredictable_challenges::all_columns.nullable(),
        ))
        .order(user_active_challenges::started_at.desc())
        .into_boxed();

    if let Some(id) = filter.id {
        query = query.filter(user_active_challenges::id.eq(id));
    }
    if let Some(status) = filter.status {
        query = query.filter(user_active_challenges::status.eq(status.as_str()));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(user_active_challenges::challenge_kind.eq(kind.as_str()));
    }

    let rows: Vec<ChallengeRow> = query.load(conn)?;
    Ok(rows.into_iter().map(into_view).collect())
}

fn active_unpredictable(conn: &mut DbConn, user_id: Uuid) -> ApiResult<Option<UserChallengeView>> {
    load_views(
        conn,
        user_id,
        ChallengeFilter {
            status: Some(ChallengeStatus::Active),
            kind: Some(ChallengeKind::Unpredictable),
            ..Default::default()
        },
    )
    .map(|views| views.into_iter().next())
    .map_err(log_db_error("load active unpredictable challenge"))
}

fn expire_for_user(conn: &mut DbConn, user_id: Uuid, now: NaiveDateTime) -> ApiResult<()> {
    let expired = expire_stale(conn, Some(user_id), now)
        .map_err(log_db_error("expire stale challenges"))?;
    if expired > 0 {
        info!(user_id = %user_id, expired, "Expired stale challenges");
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    /// False when the user already had an active unpredictable challenge.
    pub assigned: bool,
    pub challenge: UserChallengeView,
}

/// Draws a weighted random unpredictable challenge for the caller.
///
/// At most one unpredictable challenge is active per user. A caller that
/// already has one gets it back unchanged.
#[utoipa::path(
    post,
    path = "/api/challenges/assign-random",
    tag = "Challenges",
    responses(
        (status = 201, description = "New challenge assigned", body = AssignmentResponse),
        (status = 200, description = "Existing active challenge", body = AssignmentResponse),
        (status = 404, description = "No active challenge templates", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_random(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<(StatusCode, Json<AssignmentResponse>)> {
    let user_id = current_user_id(&claims)?;
    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    expire_for_user(&mut conn, user_id, now)?;

    if let Some(existing) = active_unpredictable(&mut conn, user_id)? {
        record_challenge_assignment(false);
        return Ok((
            StatusCode::OK,
            Json(AssignmentResponse {
                assigned: false,
                challenge: existing,
            }),
        ));
    }

    let templates: Vec<UnpredictableChallenge> = unpredictable_challenges::table
        .filter(unpredictable_challenges::is_active.eq(true))
        .order(unpredictable_challenges::created_at.asc())
        .load(&mut conn)
        .map_err(log_db_error("load challenge templates"))?;

    let template = pick_weighted(&templates, |t| i64::from(t.weight), &mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| {
            warn!(user_id = %user_id, "No active challenge templates to assign");
            ApiError::not_found("No challenges available", "NO_CHALLENGES_AVAILABLE")
        })?;

    let inserted = diesel::insert_into(user_active_challenges::table)
        .values(&NewUserActiveChallenge {
            user_id,
            challenge_kind: ChallengeKind::Unpredictable.as_str().to_string(),
            ngo_challenge_id: None,
            unpredictable_challenge_id: Some(template.id),
            target: template.target_count,
            expires_at: now + Duration::hours(i64::from(template.duration_hours)),
        })
        .get_result::<UserActiveChallenge>(&mut conn);

    match inserted {
        Ok(row) => {
            record_challenge_assignment(true);
            info!(
                user_id = %user_id,
                challenge_id = %row.id,
                template_id = %template.id,
                weight = template.weight,
                "Unpredictable challenge assigned"
            );
            Ok((
                StatusCode::CREATED,
                Json(AssignmentResponse {
                    assigned: true,
                    challenge: UserChallengeView::new(row, Some(template.into())),
                }),
            ))
        }
        // A concurrent request assigned one first; hand back the winner.
        Err(e) if is_unique_violation(&e) => {
            let existing = active_unpredictable(&mut conn, user_id)?.ok_or_else(|| {
                ApiError::conflict("Challenge assignment in progress", "ASSIGNMENT_CONFLICT")
            })?;
            record_challenge_assignment(false);
            Ok((
                StatusCode::OK,
                Json(AssignmentResponse {
                    assigned: false,
                    challenge: existing,
                }),
            ))
        }
        Err(e) => Err(log_db_error("assign challenge")(e)),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NgoChallengeView {
    #[serde(flatten)]
    pub challenge: NgoChallenge,
    /// Whether the caller has an active opt-in for this challenge.
    pub joined: bool,
}

#[utoipa::path(
    get,
    path = "/api/challenges/ngo",
    tag = "Challenges",
    responses(
        (status = 200, description = "Open NGO challenges", body = [NgoChallengeView])
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_ngo_challenges(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<NgoChallengeView>>> {
    let user_id = current_user_id(&claims)?;
    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    expire_for_user(&mut conn, user_id, now)?;

    let challenges: Vec<NgoChallenge> = ngo_challenges::table
        .filter(ngo_challenges::is_active.eq(true))
        .order(ngo_challenges::created_at.desc())
        .load(&mut conn)
        .map_err(log_db_error("list ngo challenges"))?;

    let joined: HashSet<Uuid> = user_active_challenges::table
        .filter(user_active_challenges::user_id.eq(user_id))
        .filter(user_active_challenges::status.eq(ChallengeStatus::Active.as_str()))
        .select(user_active_challenges::ngo_challenge_id)
        .load::<Option<Uuid>>(&mut conn)
        .map_err(log_db_error("load joined ngo challenges"))?
        .into_iter()
        .flatten()
        .collect();

    let views = challenges
        .into_iter()
        .filter(|c| c.is_open(now))
        .map(|challenge| NgoChallengeView {
            joined: joined.contains(&challenge.id),
            challenge,
        })
        .collect();

    Ok(Json(views))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNgoChallengeRequest {
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Ocean Guardians")]
    pub ngo_name: String,
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Beach clean-up week")]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(url(message = "logo_url must be a URL"))]
    pub logo_url: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    #[schema(example = 5)]
    pub target_count: i32,
    #[validate(range(min = 1, max = 365))]
    #[schema(example = 7)]
    pub duration_days: i32,
    #[validate(range(min = 0, max = 10000))]
    #[schema(example = 100)]
    pub points_reward: i32,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
}

#[utoipa::path(
    post,
    path = "/api/challenges/ngo",
    tag = "Challenges",
    request_body = CreateNgoChallengeRequest,
    responses(
        (status = 201, description = "NGO challenge created", body = NgoChallenge),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_ngo_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateNgoChallengeRequest>,
) -> ApiResult<(StatusCode, Json<NgoChallenge>)> {
    validate_payload(&payload)?;

    if let (Some(start), Some(end)) = (payload.starts_at, payload.ends_at) {
        if end <= start {
            return Err(ApiError::bad_request(
                "ends_at must be after starts_at",
                "INVALID_WINDOW",
            ));
        }
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let challenge: NgoChallenge = diesel::insert_into(ngo_challenges::table)
        .values(&NewNgoChallenge {
            ngo_name: payload.ngo_name,
            title: payload.title,
            description: payload.description,
            logo_url: payload.logo_url,
            target_count: payload.target_count,
            duration_days: payload.duration_days,
            points_reward: payload.points_reward,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
        })
        .get_result(&mut conn)
        .map_err(log_db_error("create ngo challenge"))?;

    info!(admin_id = %claims.sub, challenge_id = %challenge.id, ngo = %challenge.ngo_name, "NGO challenge created");

    Ok((StatusCode::CREATED, Json(challenge)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserChallengesQuery {
    /// `active`, `completed` or `expired`.
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/challenges/user",
    tag = "Challenges",
    params(UserChallengesQuery),
    responses(
        (status = 200, description = "Caller's challenges, newest first", body = [UserChallengeView]),
        (status = 400, description = "Unknown status filter", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_user_challenges(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserChallengesQuery>,
) -> ApiResult<Json<Vec<UserChallengeView>>> {
    let user_id = current_user_id(&claims)?;

    let status = query
        .status
        .as_deref()
        .map(|s| {
            ChallengeStatus::parse(s).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown status '{}'", s), "INVALID_STATUS")
            })
        })
        .transpose()?;

    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    expire_for_user(&mut conn, user_id, now)?;

    let views = load_views(
        &mut conn,
        user_id,
        ChallengeFilter {
            status,
            ..Default::default()
        },
    )
    .map_err(log_db_error("list user challenges"))?;

    Ok(Json(views))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinNgoChallengeRequest {
    pub ngo_challenge_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/challenges/user",
    tag = "Challenges",
    request_body = JoinNgoChallengeRequest,
    responses(
        (status = 201, description = "Joined", body = UserChallengeView),
        (status = 404, description = "NGO challenge not found or closed", body = ApiError),
        (status = 409, description = "Already joined", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_ngo_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinNgoChallengeRequest>,
) -> ApiResult<(StatusCode, Json<UserChallengeView>)> {
    let user_id = current_user_id(&claims)?;
    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    expire_for_user(&mut conn, user_id, now)?;

    let challenge: NgoChallenge = ngo_challenges::table
        .find(payload.ngo_challenge_id)
        .first::<NgoChallenge>(&mut conn)
        .optional()
        .map_err(log_db_error("load ngo challenge"))?
        .filter(|c| c.is_open(now))
        .ok_or_else(|| {
            ApiError::not_found("NGO challenge not found", "NGO_CHALLENGE_NOT_FOUND")
        })?;

    let already_joined = diesel::select(diesel::dsl::exists(
        user_active_challenges::table
            .filter(user_active_challenges::user_id.eq(user_id))
            .filter(user_active_challenges::ngo_challenge_id.eq(challenge.id))
            .filter(user_active_challenges::status.eq(ChallengeStatus::Active.as_str())),
    ))
    .get_result::<bool>(&mut conn)
    .map_err(log_db_error("check ngo participation"))?;

    let already_joined_error =
        || ApiError::conflict("Already joined this challenge", "ALREADY_JOINED");
    if already_joined {
        return Err(already_joined_error());
    }

    let row: UserActiveChallenge = diesel::insert_into(user_active_challenges::table)
        .values(&NewUserActiveChallenge {
            user_id,
            challenge_kind: ChallengeKind::Ngo.as_str().to_string(),
            ngo_challenge_id: Some(challenge.id),
            unpredictable_challenge_id: None,
            target: challenge.target_count,
            expires_at: now + Duration::days(i64::from(challenge.duration_days)),
        })
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                already_joined_error()
            } else {
                log_db_error("join ngo challenge")(e)
            }
        })?;

    info!(user_id = %user_id, challenge_id = %row.id, ngo_challenge_id = %challenge.id, "NGO challenge joined");

    Ok((
        StatusCode::CREATED,
        Json(UserChallengeView::new(row, Some(challenge.into()))),
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProgressRequest {
    #[validate(range(min = 1, max = 1000, message = "amount must be between 1 and 1000"))]
    #[serde(default = "default_amount")]
    #[schema(example = 1, minimum = 1)]
    pub amount: i32,
}

fn default_amount() -> i32 {
    1
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub challenge: UserChallengeView,
    pub completed: bool,
    pub points_awarded: i32,
    /// Journey total after the award, when one was made.
    pub total_points: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
enum ProgressError {
    #[error("challenge not found")]
    NotFound,
    #[error("challenge is {0}")]
    NotActive(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

fn reward_for(conn: &mut PgConnection, row: &UserActiveChallenge) -> QueryResult<i32> {
    if let Some(id) = row.ngo_challenge_id {
        ngo_challenges::table
            .find(id)
            .select(ngo_challenges::points_reward)
            .first(conn)
    } else if let Some(id) = row.unpredictable_challenge_id {
        unpredictable_challenges::table
            .find(id)
            .select(unpredictable_challenges::points_reward)
            .first(conn)
    } else {
        Ok(0)
    }
}

/// Records progress on one of the caller's active challenges.
///
/// Reaching the target completes the challenge and awards its points in the
/// same transaction.
#[utoipa::path(
    post,
    path = "/api/challenges/user/{id}/progress",
    tag = "Challenges",
    params(("id" = Uuid, Path, description = "User challenge ID")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Progress recorded", body = ProgressResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Challenge not found", body = ApiError),
        (status = 409, description = "Challenge completed or expired", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let user_id = current_user_id(&claims)?;
    validate_payload(&payload)?;

    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    // Committed on its own so an expired row stays expired after the 409.
    expire_for_user(&mut conn, user_id, now)?;

    let result = conn.transaction::<_, ProgressError, _>(|conn| {
        let row: UserActiveChallenge = user_active_challenges::table
            .filter(user_active_challenges::id.eq(id))
            .filter(user_active_challenges::user_id.eq(user_id))
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(ProgressError::NotFound)?;

        if row.status != ChallengeStatus::Active.as_str() {
            return Err(ProgressError::NotActive(row.status));
        }

        let update = apply_progress(row.progress, row.target, payload.amount);
        let status = if update.completed {
            ChallengeStatus::Completed
        } else {
            ChallengeStatus::Active
        };

        let row: UserActiveChallenge = diesel::update(user_active_challenges::table.find(row.id))
            .set((
                user_active_challenges::progress.eq(update.progress),
                user_active_challenges::status.eq(status.as_str()),
                user_active_challenges::completed_at.eq(update.completed.then_some(now)),
            ))
            .get_result(conn)?;

        let mut awarded = (0, None);
        if update.completed {
            let reward = reward_for(conn, &row)?;
            if reward > 0 {
                let outcome = award_points(
                    conn,
                    PointsAward {
                        user_id,
                        delta: reward,
                        reason: "Challenge completed",
                        source: PointsSource::Challenge,
                        reference_id: Some(row.id),
                    },
                )?;
                awarded = (reward, Some(outcome.total_points));
            }
        }

        Ok((row, update.completed, awarded))
    });

    let (row, completed, (points_awarded, total_points)) = match result {
        Ok(done) => done,
        Err(ProgressError::NotFound) => {
            return Err(ApiError::not_found(
                "Challenge not found",
                "CHALLENGE_NOT_FOUND",
            ))
        }
        Err(ProgressError::NotActive(status)) => {
            let code = if status == ChallengeStatus::Expired.as_str() {
                "CHALLENGE_EXPIRED"
            } else {
                "CHALLENGE_NOT_ACTIVE"
            };
            return Err(ApiError::conflict(format!("Challenge is {}", status), code));
        }
        Err(ProgressError::Ledger(LedgerError::Database(e)) | ProgressError::Database(e)) => {
            return Err(log_db_error("record challenge progress")(e))
        }
        Err(ProgressError::Ledger(e)) => {
            return Err(ApiError::internal(e.to_string(), "LEDGER_ERROR"));
        }
    };

    if completed {
        info!(user_id = %user_id, challenge_id = %row.id, points_awarded, "Challenge completed");
    }

    let challenge = load_views(
        &mut conn,
        user_id,
        ChallengeFilter {
            id: Some(row.id),
            ..Default::default()
        },
    )
    .map_err(log_db_error("load challenge"))?
    .into_iter()
    .next()
    .unwrap_or_else(|| UserChallengeView::new(row, None));

    Ok(Json(ProgressResponse {
        challenge,
        completed,
        points_awarded,
        total_points,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: ChallengeKind) -> UserActiveChallenge {
        let now = Utc::now().naive_utc();
        UserActiveChallenge {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            challenge_kind: kind.as_str().to_string(),
            ngo_challenge_id: None,
            unpredictable_challenge_id: None,
            progress: 0,
            target: 3,
            status: "active".to_string(),
            started_at: now,
            expires_at: now + Duration::hours(24),
            completed_at: None,
            assignment_notified: false,
            expiry_notified: false,
        }
    }

    #[test]
    fn test_view_uses_ngo_template_when_present() {
        let now = Utc::now().naive_utc();
        let ngo = NgoChallenge {
            id: Uuid::new_v4(),
            ngo_name: "Ocean Guardians".to_string(),
            title: "Beach clean".to_string(),
            description: "Pick up litter".to_string(),
            logo_url: None,
            target_count: 3,
            duration_days: 7,
            points_reward: 40,
            is_active: true,
            starts_at: None,
            ends_at: None,
            created_at: now,
        };

        let view = into_view((row(ChallengeKind::Ngo), Some(ngo), None));
        let template = view.template.expect("template");
        assert_eq!(template.ngo_name.as_deref(), Some("Ocean Guardians"));
        assert_eq!(template.points_reward, 40);
        assert!(template.challenge_type.is_none());
    }

    #[test]
    fn test_view_without_template() {
        let view = into_view((row(ChallengeKind::Unpredictable), None, None));
        assert!(view.template.is_none());
        assert_eq!(view.challenge_kind, "unpredictable");
    }

    #[test]
    fn test_progress_amount_defaults_to_one() {
        let payload: ProgressRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.amount, 1);
        assert!(payload.validate().is_ok());

        let payload: ProgressRequest = serde_json::from_str(r#"{"amount": 0}"#).unwrap();
        assert!(payload.validate().is_err());
    }
}
