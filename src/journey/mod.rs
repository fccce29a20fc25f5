//! Species journeys: a user's point total and ecological status.

pub mod ledger;
pub mod status;

pub use ledger::{award_points, AwardOutcome, LedgerError, PointsAward, PointsSource};
pub use status::EcoStatus;
