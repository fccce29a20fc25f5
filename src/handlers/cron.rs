//! Scheduled maintenance routes, called by an external scheduler.

use axum::{extract::State, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Role,
    challenges::expire_stale,
    error::{get_db_conn, log_db_error, ApiResult},
    models::GuestSession,
    schema::{guest_sessions, refresh_tokens, users},
    telemetry::record_guest_cleanup,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupFailure {
    pub session_id: Uuid,
    pub error: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct CleanupReport {
    /// Expired sessions found.
    pub processed: usize,
    pub expired_sessions: usize,
    pub deactivated_users: usize,
    pub expired_challenges: usize,
    pub errors: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    /// The session had been claimed or expired since the sweep loaded it.
    Skipped,
    Expired { deactivated: bool },
}

/// Expires one guest session and disables its account.
///
/// The session row is only touched while it is still `active`; a guest who
/// claimed the account after the sweep's snapshot keeps it.
pub fn expire_session(
    conn: &mut PgConnection,
    session: &GuestSession,
) -> QueryResult<SessionExpiry> {
    conn.transaction(|conn| {
        let now = Utc::now().naive_utc();

        let expired = diesel::update(
            guest_sessions::table
                .find(session.id)
                .filter(guest_sessions::status.eq("active")),
        )
        .set((
            guest_sessions::status.eq("expired"),
            guest_sessions::cleaned_up_at.eq(Some(now)),
        ))
        .execute(conn)?;

        if expired == 0 {
            return Ok(SessionExpiry::Skipped);
        }

        let deactivated = diesel::update(
            users::table
                .find(session.user_id)
                .filter(users::role.eq(Role::Guest.as_str()))
                .filter(users::is_active.eq(true)),
        )
        .set((
            users::is_active.eq(false),
            users::is_premium.eq(false),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;

        diesel::delete(refresh_tokens::table.filter(refresh_tokens::user_id.eq(session.user_id)))
            .execute(conn)?;

        Ok(SessionExpiry::Expired {
            deactivated: deactivated > 0,
        })
    })
}

/// Expires lapsed guest sessions and stale challenges.
///
/// Each session is handled in its own transaction; a failure is reported and
/// the sweep moves on.
#[utoipa::path(
    get,
    path = "/api/cron/cleanup-guests",
    tag = "Cron",
    responses(
        (status = 200, description = "Cleanup report", body = CleanupReport),
        (status = 401, description = "Missing or wrong cron secret"),
        (status = 503, description = "Cron secret not configured")
    ),
    security(("cron_secret" = []))
)]
pub async fn cleanup_guests(State(state): State<AppState>) -> ApiResult<Json<CleanupReport>> {
    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    let sessions: Vec<GuestSession> = guest_sessions::table
        .filter(guest_sessions::status.eq("active"))
        .filter(guest_sessions::expires_at.lt(now))
        .order(guest_sessions::expires_at.asc())
        .load(&mut conn)
        .map_err(log_db_error("load expired guest sessions"))?;

    let mut report = CleanupReport {
        processed: sessions.len(),
        ..Default::default()
    };

    for session in &sessions {
        match expire_session(&mut conn, session) {
            Ok(SessionExpiry::Skipped) => {
                info!(session_id = %session.id, "Guest session changed during sweep, skipped");
                continue;
            }
            Ok(SessionExpiry::Expired { deactivated }) => {
                report.expired_sessions += 1;
                if deactivated {
                    report.deactivated_users += 1;
                }
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Guest session cleanup failed");
                report.errors.push(CleanupFailure {
                    session_id: session.id,
                    error: "Database error".to_string(),
                });
                continue;
            }
        }

        // Outstanding access tokens stay valid until expiry without Redis.
        if let Err(e) = state
            .cache
            .token_revocation
            .revoke_all_user_tokens(session.user_id, state.jwt_config.access_token_expiry as u64)
            .await
        {
            warn!(user_id = %session.user_id, error = %e, "Could not revoke guest access tokens");
        }
    }

    match expire_stale(&mut conn, None, now) {
        Ok(count) => report.expired_challenges = count,
        Err(e) => error!(error = %e, "Challenge expiry sweep failed"),
    }

    record_guest_cleanup(report.expired_sessions, report.errors.len());
    info!(
        processed = report.processed,
        expired_sessions = report.expired_sessions,
        deactivated_users = report.deactivated_users,
        expired_challenges = report.expired_challenges,
        failures = report.errors.len(),
        "Guest cleanup finished"
    );

    Ok(Json(report))
}
