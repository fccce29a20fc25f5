//! Naturalist leaderboard queries and competition ranking.

use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{display_name, SpeciesAvatar, User, UserSpeciesJourney};
use crate::schema::{species_avatars, user_species_journeys, users};

pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    #[schema(example = 1)]
    pub rank: i64,
    pub user_id: Uuid,
    #[schema(example = "Ada")]
    pub display_name: String,
    pub avatar: Option<SpeciesAvatar>,
    #[schema(example = 640)]
    pub total_points: i32,
    #[schema(example = "near_threatened")]
    pub current_status: String,
    pub is_current_user: bool,
}

pub fn clamp_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// Ranks for totals already sorted in descending order.
///
/// Ties share the rank of their first occurrence, so each rank equals one
/// plus the number of strictly greater totals.
pub fn competition_ranks(sorted_desc: &[i32]) -> Vec<i64> {
    let mut ranks = Vec::with_capacity(sorted_desc.len());
    for (i, points) in sorted_desc.iter().enumerate() {
        let rank = match (i, ranks.last()) {
            (0, _) | (_, None) => 1,
            (_, Some(&prev)) if sorted_desc[i - 1] == *points => prev,
            _ => i as i64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

type BoardRow = (UserSpeciesJourney, User, Option<SpeciesAvatar>);

fn to_entry((journey, user, avatar): BoardRow, rank: i64, caller: Uuid) -> LeaderboardEntry {
    LeaderboardEntry {
        rank,
        user_id: user.id,
        display_name: display_name(user.full_name.as_deref(), &user.email),
        avatar,
        total_points: journey.total_points,
        current_status: journey.current_status,
        is_current_user: user.id == caller,
    }
}

/// Top `limit` journeys of active users, best first, oldest first on ties.
pub fn top_entries(
    conn: &mut PgConnection,
    limit: i64,
    caller: Uuid,
) -> QueryResult<Vec<LeaderboardEntry>> {
    let rows: Vec<BoardRow> = user_species_journeys::table
        .inner_join(users::table)
        .left_join(species_avatars::table)
        .filter(users::is_active.eq(true))
        .order((
            user_species_journeys::total_points.desc(),
            user_species_journeys::created_at.asc(),
        ))
        .limit(limit)
        .select((
            user_species_journeys::all_columns,
            users::all_columns,
            species_avatars::all_columns.nullable(),
        ))
        .load(conn)?;

    let totals: Vec<i32> = rows.iter().map(|(j, _, _)| j.total_points).collect();
    Ok(rows
        .into_iter()
        .zip(competition_ranks(&totals))
        .map(|(row, rank)| to_entry(row, rank, caller))
        .collect())
}

/// The caller's entry with its global rank, if they have a journey.
pub fn entry_for(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<LeaderboardEntry>> {
    let row: Option<BoardRow> = user_species_journeys::table
        .inner_join(users::table)
        .left_join(species_avatars::table)
        .filter(user_species_journeys::user_id.eq(user_id))
        .select((
            user_species_journeys::all_columns,
            users::all_columns,
            species_avatars::all_columns.nullable(),
        ))
        .first(conn)
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let ahead: i64 = user_species_journeys::table
        .inner_join(users::table)
        .filter(users::is_active.eq(true))
        .filter(user_species_journeys::total_points.gt(row.0.total_points))
        .count()
        .get_result(conn)?;

    Ok(Some(to_entry(row, ahead + 1, user_id)))
}

pub fn participant_count(conn: &mut PgConnection) -> QueryResult<i64> {
    user_species_journeys::table
        .inner_join(users::table)
        .filter(users::is_active.eq(true))
        .count()
        .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_share_rank() {
        assert_eq!(
            competition_ranks(&[500, 300, 300, 120, 120, 120, 10]),
            vec![1, 2, 2, 4, 4, 4, 7]
        );
    }

    #[test]
    fn test_rank_is_one_plus_strictly_greater() {
        let totals = [90, 90, 75, 60, 60, 0, -5];
        let ranks = competition_ranks(&totals);
        for (i, points) in totals.iter().enumerate() {
            let greater = totals.iter().filter(|p| *p > points).count() as i64;
            assert_eq!(ranks[i], greater + 1);
        }
    }

    #[test]
    fn test_empty_board() {
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(clamp_limit(None, 10), 10);
        assert_eq!(clamp_limit(Some(0), 10), 1);
        assert_eq!(clamp_limit(Some(-3), 10), 1);
        assert_eq!(clamp_limit(Some(500), 10), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(25), 10), 25);
    }
}
