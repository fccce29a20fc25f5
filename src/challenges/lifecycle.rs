//! Challenge status transitions.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::user_active_challenges;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Active,
    Completed,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ChallengeStatus::Active),
            "completed" => Some(ChallengeStatus::Completed),
            "expired" => Some(ChallengeStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Ngo,
    Unpredictable,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Ngo => "ngo",
            ChallengeKind::Unpredictable => "unpredictable",
        }
    }
}

/// Marks active challenges past their deadline as expired.
///
/// With `user_id` set only that user's rows are touched (lazy expiry on read
/// and assign); with `None` every user's rows are swept (cron).
pub fn expire_stale(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    now: NaiveDateTime,
) -> QueryResult<usize> {
    let stale = user_active_challenges::table
        .filter(user_active_challenges::status.eq(ChallengeStatus::Active.as_str()))
        .filter(user_active_challenges::expires_at.lt(now));

    match user_id {
        Some(uid) => diesel::update(stale.filter(user_active_challenges::user_id.eq(uid)))
            .set(user_active_challenges::status.eq(ChallengeStatus::Expired.as_str()))
            .execute(conn),
        None => diesel::update(stale)
            .set(user_active_challenges::status.eq(ChallengeStatus::Expired.as_str()))
            .execute(conn),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: i32,
    pub completed: bool,
}

/// Adds `amount` to `progress`, capped at `target`.
pub fn apply_progress(progress: i32, target: i32, amount: i32) -> ProgressUpdate {
    let progress = progress.saturating_add(amount.max(0)).min(target);
    ProgressUpdate {
        progress,
        completed: progress >= target,
    }
}
