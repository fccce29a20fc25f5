//! Naturalist leaderboard route.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, log_db_error, ApiResult},
    helpers::current_user_id,
    leaderboard::{clamp_limit, entry_for, participant_count, top_entries, LeaderboardEntry},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries, clamped to 1..=100.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    /// Caller's own entry, also when it falls outside `entries`.
    pub current_user: Option<LeaderboardEntry>,
    pub total_participants: i64,
}

#[utoipa::path(
    get,
    path = "/api/leaderboard/naturalists",
    tag = "Leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Top naturalists by points", body = LeaderboardResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn naturalists(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let user_id = current_user_id(&claims)?;
    let limit = clamp_limit(query.limit, state.habitat.leaderboard_default_limit);
    let mut conn = get_db_conn(&state.db_pool)?;

    let entries =
        top_entries(&mut conn, limit, user_id).map_err(log_db_error("load leaderboard"))?;

    let current_user = match entries.iter().find(|e| e.is_current_user) {
        Some(entry) => Some(entry.clone()),
        None => entry_for(&mut conn, user_id).map_err(log_db_error("rank current user"))?,
    };

    let total_participants =
        participant_count(&mut conn).map_err(log_db_error("count participants"))?;

    debug!(
        user_id = %user_id,
        limit,
        returned = entries.len(),
        total_participants,
        "Leaderboard served"
    );

    Ok(Json(LeaderboardResponse {
        entries,
        current_user,
        total_participants,
    }))
}
