//! Time-boxed challenges: weighted random assignment and NGO opt-ins.

pub mod lifecycle;
pub mod selection;

pub use lifecycle::{apply_progress, expire_stale, ChallengeKind, ChallengeStatus};
pub use selection::pick_weighted;
