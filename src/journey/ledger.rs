//! Points ledger shared by journeys, observations and challenges.
//!
//! Every mutation goes through [`award_points`]: the running total is bumped
//! with a single upsert, so concurrent awards never overwrite each other, and
//! an audit row is appended to `points_history` in the same transaction.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::status::EcoStatus;
use crate::models::{NewPointsHistoryEntry, NewUserSpeciesJourney};
use crate::schema::{points_history, user_species_journeys};
use crate::telemetry::record_points_awarded;

pub const WELCOME_BONUS_POINTS: i32 = 50;
pub const OBSERVATION_POINTS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsSource {
    Welcome,
    Observation,
    Challenge,
}

impl PointsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsSource::Welcome => "welcome",
            PointsSource::Observation => "observation",
            PointsSource::Challenge => "challenge",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointsAward<'a> {
    pub user_id: Uuid,
    pub delta: i32,
    pub reason: &'a str,
    pub source: PointsSource,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardOutcome {
    pub total_points: i32,
    pub status: EcoStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Points delta must be non-zero")]
    ZeroDelta,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Applies a signed delta to the user's journey, creating it if needed.
///
/// Runs in its own transaction, which nests as a savepoint when the caller
/// already holds one.
pub fn award_points(
    conn: &mut PgConnection,
    award: PointsAward<'_>,
) -> Result<AwardOutcome, LedgerError> {
    if award.delta == 0 {
        return Err(LedgerError::ZeroDelta);
    }

    let outcome = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let now = Utc::now().naive_utc();

        let total_points: i32 = diesel::insert_into(user_species_journeys::table)
            .values(&NewUserSpeciesJourney {
                user_id: award.user_id,
                species_avatar_id: None,
                total_points: award.delta,
                current_status: EcoStatus::from_points(award.delta).as_str().to_string(),
            })
            .on_conflict(user_species_journeys::user_id)
            .do_update()
            .set((
                user_species_journeys::total_points
                    .eq(user_species_journeys::total_points + award.delta),
                user_species_journeys::updated_at.eq(now),
            ))
            .returning(user_species_journeys::total_points)
            .get_result(conn)?;

        let status = EcoStatus::from_points(total_points);
        diesel::update(
            user_species_journeys::table.filter(user_species_journeys::user_id.eq(award.user_id)),
        )
        .set(user_species_journeys::current_status.eq(status.as_str()))
        .execute(conn)?;

        diesel::insert_into(points_history::table)
            .values(&NewPointsHistoryEntry {
                user_id: award.user_id,
                points: award.delta,
                reason: award.reason.to_string(),
                source: award.source.as_str().to_string(),
                reference_id: award.reference_id,
                balance_after: total_points,
            })
            .execute(conn)?;

        Ok(AwardOutcome {
            total_points,
            status,
        })
    })?;

    record_points_awarded(award.source.as_str(), award.delta);
    info!(
        user_id = %award.user_id,
        delta = award.delta,
        source = award.source.as_str(),
        total_points = outcome.total_points,
        "Points awarded"
    );

    Ok(outcome)
}
