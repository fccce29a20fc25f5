//! Ecological status ladder derived from a journey's point total.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EcoStatus {
    CriticallyEndangered,
    Endangered,
    Vulnerable,
    NearThreatened,
    LeastConcern,
}

impl EcoStatus {
    pub fn from_points(total_points: i32) -> Self {
        match total_points {
            i32::MIN..=99 => EcoStatus::CriticallyEndangered,
            100..=299 => EcoStatus::Endangered,
            300..=599 => EcoStatus::Vulnerable,
            600..=999 => EcoStatus::NearThreatened,
            _ => EcoStatus::LeastConcern,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EcoStatus::CriticallyEndangered => "critically_endangered",
            EcoStatus::Endangered => "endangered",
            EcoStatus::Vulnerable => "vulnerable",
            EcoStatus::NearThreatened => "near_threatened",
            EcoStatus::LeastConcern => "least_concern",
        }
    }
}
