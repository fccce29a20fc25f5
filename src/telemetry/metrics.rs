//! Application metrics using the metrics crate.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(enabled: bool) -> Result<Self, BuildError> {
        if !enabled {
            return Ok(Self::disabled());
        }

        let handle = match PROMETHEUS_HANDLE.get() {
            Some(handle) => handle.clone(),
            None => {
                let handle = PrometheusBuilder::new().install_recorder()?;
                PROMETHEUS_HANDLE.get_or_init(|| handle).clone()
            }
        };

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.render())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<MetricsState>,
) -> impl IntoResponse {
    match state.render() {
        Some(metrics) => (StatusCode::OK, metrics),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not enabled".to_string(),
        ),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AuthOutcome {
    Success,
    InvalidCredentials,
    AccountInactive,
    TokenExpired,
    TokenRevoked,
}

impl AuthOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::InvalidCredentials => "invalid_credentials",
            AuthOutcome::AccountInactive => "account_inactive",
            AuthOutcome::TokenExpired => "token_expired",
            AuthOutcome::TokenRevoked => "token_revoked",
        }
    }
}

pub fn record_auth_attempt(action: &str, outcome: AuthOutcome) {
    counter!(
        "auth_attempts_total",
        "action" => action.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// `outcome` is `success` or a redemption failure label.
pub fn record_guest_activation(outcome: &'static str) {
    counter!("habitat_guest_activations_total", "outcome" => outcome).increment(1);
}

pub fn record_guest_conversion() {
    counter!("habitat_guest_conversions_total").increment(1);
}

pub fn record_guest_cleanup(expired_sessions: usize, failures: usize) {
    counter!("habitat_guest_sessions_expired_total").increment(expired_sessions as u64);
    counter!("habitat_guest_cleanup_failures_total").increment(failures as u64);
}

pub fn record_challenge_assignment(newly_assigned: bool) {
    counter!(
        "habitat_challenge_assignments_total",
        "result" => if newly_assigned { "assigned" } else { "existing" }
    )
    .increment(1);
}

pub fn record_points_awarded(source: &'static str, delta: i32) {
    counter!("habitat_points_awarded_total", "source" => source)
        .increment(u64::from(delta.unsigned_abs()));
}

pub fn record_request_latency(
    method: &str,
    path: &str,
    status: u16,
    duration: std::time::Duration,
) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}
