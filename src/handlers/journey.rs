//! Species journey handlers: avatar choice, point totals and history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, is_unique_violation, log_db_error, ApiError, ApiResult, DbConn},
    helpers::current_user_id,
    journey::{
        award_points, ledger::WELCOME_BONUS_POINTS, EcoStatus, LedgerError, PointsAward,
        PointsSource,
    },
    models::{NewUserSpeciesJourney, PointsHistoryEntry, SpeciesAvatar, UserSpeciesJourney},
    pagination::{PaginatedResponse, PaginationParams},
    schema::{points_history, species_avatars, user_species_journeys},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct JourneyResponse {
    #[serde(flatten)]
    pub journey: UserSpeciesJourney,
    pub avatar: Option<SpeciesAvatar>,
}

fn load_journey(conn: &mut DbConn, user_id: Uuid) -> QueryResult<Option<JourneyResponse>> {
    user_species_journeys::table
        .left_join(species_avatars::table)
        .filter(user_species_journeys::user_id.eq(user_id))
        .select((
            user_species_journeys::all_columns,
            species_avatars::all_columns.nullable(),
        ))
        .first::<(UserSpeciesJourney, Option<SpeciesAvatar>)>(conn)
        .optional()
        .map(|row| row.map(|(journey, avatar)| JourneyResponse { journey, avatar }))
}

#[utoipa::path(
    get,
    path = "/api/species-journey",
    tag = "Journey",
    responses(
        (status = 200, description = "Caller's journey", body = JourneyResponse),
        (status = 404, description = "No journey yet", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_journey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<JourneyResponse>> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    load_journey(&mut conn, user_id)
        .map_err(log_db_error("load journey"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Journey not started", "JOURNEY_NOT_FOUND"))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartJourneyRequest {
    pub species_avatar_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
enum StartJourneyError {
    #[error("avatar not found")]
    AvatarNotFound,
    #[error("journey already started")]
    AlreadyStarted,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Picks the caller's species avatar and grants the welcome bonus.
///
/// A journey created implicitly by an earlier points award has no avatar
/// yet; choosing one completes it and still grants the bonus once.
#[utoipa::path(
    post,
    path = "/api/species-journey",
    tag = "Journey",
    request_body = StartJourneyRequest,
    responses(
        (status = 201, description = "Journey started", body = JourneyResponse),
        (status = 404, description = "Unknown avatar", body = ApiError),
        (status = 409, description = "Journey already started", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_journey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartJourneyRequest>,
) -> ApiResult<(StatusCode, Json<JourneyResponse>)> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let result = conn.transaction::<_, StartJourneyError, _>(|conn| {
        let avatar_exists = diesel::select(diesel::dsl::exists(
            species_avatars::table.find(payload.species_avatar_id),
        ))
        .get_result::<bool>(conn)?;
        if !avatar_exists {
            return Err(StartJourneyError::AvatarNotFound);
        }

        let existing: Option<UserSpeciesJourney> = user_species_journeys::table
            .filter(user_species_journeys::user_id.eq(user_id))
            .for_update()
            .first(conn)
            .optional()?;

        let journey_id = match existing {
            Some(journey) if journey.species_avatar_id.is_some() => {
                return Err(StartJourneyError::AlreadyStarted)
            }
            Some(journey) => {
                diesel::update(user_species_journeys::table.find(journey.id))
                    .set((
                        user_species_journeys::species_avatar_id.eq(payload.species_avatar_id),
                        user_species_journeys::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
                journey.id
            }
            None => diesel::insert_into(user_species_journeys::table)
                .values(&NewUserSpeciesJourney {
                    user_id,
                    species_avatar_id: Some(payload.species_avatar_id),
                    total_points: 0,
                    current_status: EcoStatus::from_points(0).as_str().to_string(),
                })
                .returning(user_species_journeys::id)
                .get_result::<Uuid>(conn)?,
        };

        award_points(
            conn,
            PointsAward {
                user_id,
                delta: WELCOME_BONUS_POINTS,
                reason: "Welcome to your species journey",
                source: PointsSource::Welcome,
                reference_id: Some(journey_id),
            },
        )?;

        Ok(())
    });

    match result {
        Ok(()) => {}
        Err(StartJourneyError::AvatarNotFound) => {
            return Err(ApiError::not_found(
                "Species avatar not found",
                "AVATAR_NOT_FOUND",
            ))
        }
        Err(StartJourneyError::AlreadyStarted) => {
            return Err(ApiError::conflict(
                "Journey already started",
                "JOURNEY_EXISTS",
            ))
        }
        Err(StartJourneyError::Database(e)) if is_unique_violation(&e) => {
            return Err(ApiError::conflict(
                "Journey already started",
                "JOURNEY_EXISTS",
            ))
        }
        Err(StartJourneyError::Ledger(LedgerError::Database(e)) | StartJourneyError::Database(e)) => {
            return Err(log_db_error("start journey")(e))
        }
        Err(StartJourneyError::Ledger(e)) => {
            return Err(ApiError::internal(e.to_string(), "LEDGER_ERROR"))
        }
    }

    let journey = load_journey(&mut conn, user_id)
        .map_err(log_db_error("load journey"))?
        .ok_or_else(ApiError::db_error)?;

    info!(
        user_id = %user_id,
        species_avatar_id = %payload.species_avatar_id,
        total_points = journey.journey.total_points,
        "Species journey started"
    );

    Ok((StatusCode::CREATED, Json(journey)))
}

#[utoipa::path(
    get,
    path = "/api/species-journey/history",
    tag = "Journey",
    params(PaginationParams),
    responses(
        (status = 200, description = "Points history, newest first", body = PaginatedResponse<PointsHistoryEntry>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn points_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<PointsHistoryEntry>>> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = points_history::table
        .filter(points_history::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .map_err(log_db_error("count points history"))?;

    let entries: Vec<PointsHistoryEntry> = points_history::table
        .filter(points_history::user_id.eq(user_id))
        .order((points_history::created_at.desc(), points_history::id.desc()))
        .limit(params.per_page())
        .offset(params.offset())
        .load(&mut conn)
        .map_err(log_db_error("load points history"))?;

    Ok(Json(PaginatedResponse::from_params(
        entries,
        &params,
        total_count,
    )))
}

#[utoipa::path(
    get,
    path = "/api/species-avatars",
    tag = "Journey",
    responses(
        (status = 200, description = "Avatar catalogue", body = [SpeciesAvatar])
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_avatars(State(state): State<AppState>) -> ApiResult<Json<Vec<SpeciesAvatar>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let avatars = species_avatars::table
        .order(species_avatars::name.asc())
        .load(&mut conn)
        .map_err(log_db_error("list species avatars"))?;

    Ok(Json(avatars))
}
