//! Liveness and readiness probes.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::schema::guest_access_codes;
use crate::AppState;

const SERVICE_NAME: &str = "habitat";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "habitat")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    #[schema(example = "2025-01-15T10:30:00Z")]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    Up,
    Down,
    /// Optional dependency that is not configured.
    Disabled,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ProbeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 5)]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Connection refused")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn up(started: Instant) -> Self {
        Self {
            status: ProbeState::Up,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        }
    }

    fn down(error: impl Into<String>) -> Self {
        Self {
            status: ProbeState::Down,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    fn disabled() -> Self {
        Self {
            status: ProbeState::Disabled,
            latency_ms: None,
            error: None,
        }
    }

    /// Disabled components never block readiness.
    fn is_blocking(&self) -> bool {
        self.status == ProbeState::Down
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub database: ComponentStatus,
    /// Token revocation store used by guest cleanup and claim.
    pub redis: ComponentStatus,
    /// Whether `/api/cron/cleanup-guests` accepts calls.
    pub guest_cleanup: ComponentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    #[schema(example = "ready")]
    pub status: String,
    pub checks: ReadinessChecks,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Plain text probe", content_type = "text/plain")
    )
)]
pub async fn health_check_simple() -> &'static str {
    "OK"
}

#[utoipa::path(
    get,
    path = "/health/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service identity", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Database and Redis reachable", body = ReadinessResponse),
        (status = 503, description = "A required dependency is down", body = ReadinessResponse)
    )
)]
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let checks = ReadinessChecks {
        database: probe_database(&state).await,
        redis: probe_redis(&state).await,
        guest_cleanup: if state.habitat.cron_secret.is_some() {
            ComponentStatus {
                status: ProbeState::Up,
                latency_ms: None,
                error: None,
            }
        } else {
            ComponentStatus::disabled()
        },
    };

    let ready = !checks.database.is_blocking() && !checks.redis.is_blocking();
    if !ready {
        warn!(
            database = ?checks.database.status,
            redis = ?checks.redis.status,
            "Readiness probe failed"
        );
    }

    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        code,
        Json(ReadinessResponse {
            status: status.to_string(),
            checks,
        }),
    )
}

/// Queries a migrated table, so an unmigrated database reports down.
async fn probe_database(state: &AppState) -> ComponentStatus {
    let pool = state.db_pool.clone();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| format!("Pool exhausted: {}", e))?;
        guest_access_codes::table
            .select(guest_access_codes::id)
            .first::<uuid::Uuid>(&mut conn)
            .optional()
            .map(|_| ())
            .map_err(|e| format!("Query failed: {}", e))
    })
    .await;

    match result {
        Ok(Ok(())) => ComponentStatus::up(started),
        Ok(Err(e)) => ComponentStatus::down(e),
        Err(e) => ComponentStatus::down(format!("Probe task failed: {}", e)),
    }
}

async fn probe_redis(state: &AppState) -> ComponentStatus {
    let Some(pool) = state.cache.token_revocation.pool() else {
        return ComponentStatus::disabled();
    };
    let started = Instant::now();

    let mut conn = match pool.get().await {
        Ok(conn) => conn,
        Err(e) => return ComponentStatus::down(format!("Connection failed: {}", e)),
    };

    let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(_) => ComponentStatus::up(started),
        Err(e) => ComponentStatus::down(format!("PING failed: {}", e)),
    }
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn live_check() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_down_components_block_readiness() {
        assert!(ComponentStatus::down("Connection refused").is_blocking());
        assert!(!ComponentStatus::disabled().is_blocking());
        assert!(!ComponentStatus::up(Instant::now()).is_blocking());
    }

    #[test]
    fn test_component_status_serialization() {
        let down = serde_json::to_value(ComponentStatus::down("PING failed")).unwrap();
        assert_eq!(down["status"], "down");
        assert_eq!(down["error"], "PING failed");
        assert!(down.get("latency_ms").is_none());

        let disabled = serde_json::to_value(ComponentStatus::disabled()).unwrap();
        assert_eq!(disabled, serde_json::json!({ "status": "disabled" }));
    }

    #[tokio::test]
    async fn test_health_check_reports_service() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.service, SERVICE_NAME);
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
