//! Guest access code format and redeemability rules.

use chrono::NaiveDateTime;
use rand::Rng;

use crate::models::GuestAccessCode;

/// Excludes 0/O and 1/I/L so printed codes survive being read aloud.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const GENERATED_CODE_LENGTH: usize = 8;
pub const MIN_CUSTOM_CODE_LENGTH: usize = 4;
pub const MAX_CUSTOM_CODE_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    Premium,
    Basic,
}

impl AccessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Premium => "premium",
            AccessTier::Basic => "basic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "premium" => Some(AccessTier::Premium),
            "basic" => Some(AccessTier::Basic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RedemptionError {
    #[error("Guest code not found")]
    NotFound,
    #[error("Guest code is no longer active")]
    Inactive,
    #[error("Guest code has expired")]
    Expired,
    #[error("Guest code has reached its usage limit")]
    Exhausted,
}

impl RedemptionError {
    pub fn code(&self) -> &'static str {
        match self {
            RedemptionError::NotFound => "CODE_NOT_FOUND",
            RedemptionError::Inactive => "CODE_INACTIVE",
            RedemptionError::Expired => "CODE_EXPIRED",
            RedemptionError::Exhausted => "CODE_EXHAUSTED",
        }
    }

    /// Label used for the activation outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            RedemptionError::NotFound => "not_found",
            RedemptionError::Inactive => "inactive",
            RedemptionError::Expired => "expired",
            RedemptionError::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeFormatError {
    #[error("Code must be between 4 and 32 characters")]
    Length,
    #[error("Code may only contain letters, digits and '-'")]
    Charset,
}

/// Trims and uppercases user input. Returns `None` for blank input.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    (!code.is_empty()).then_some(code)
}

pub fn validate_custom_code(raw: &str) -> Result<String, CodeFormatError> {
    let code = raw.trim().to_ascii_uppercase();
    if !(MIN_CUSTOM_CODE_LENGTH..=MAX_CUSTOM_CODE_LENGTH).contains(&code.len()) {
        return Err(CodeFormatError::Length);
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CodeFormatError::Charset);
    }
    Ok(code)
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Checks whether `code` may be redeemed at `now`.
///
/// This is advisory: the activation handler re-checks the same conditions in
/// the conditional UPDATE that consumes the use.
pub fn check_redeemable(code: &GuestAccessCode, now: NaiveDateTime) -> Result<(), RedemptionError> {
    if !code.is_active {
        return Err(RedemptionError::Inactive);
    }
    if code.expires_at.is_some_and(|at| at <= now) {
        return Err(RedemptionError::Expired);
    }
    if code.max_uses.is_some_and(|max| code.current_uses >= max) {
        return Err(RedemptionError::Exhausted);
    }
    Ok(())
}

/// Why a conditional consume matched no row, given the code as it reads now.
///
/// `None` means the code was deleted. A code that looks redeemable again
/// lost its last use to a concurrent activation.
pub fn rejection_after_race(
    current: Option<&GuestAccessCode>,
    now: NaiveDateTime,
) -> RedemptionError {
    match current {
        None => RedemptionError::NotFound,
        Some(code) => check_redeemable(code, now)
            .err()
            .unwrap_or(RedemptionError::Exhausted),
    }
}
