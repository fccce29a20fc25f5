//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_auth_attempt, record_challenge_assignment, record_guest_activation,
    record_guest_cleanup, record_guest_conversion, record_points_awarded, AuthOutcome,
    MetricsState,
};
pub use tracing::init_telemetry;
