//! Guest access: QR campaign codes and throwaway guest accounts.

pub mod codes;

use rand::Rng;

pub use codes::{AccessTier, CodeFormatError, RedemptionError};

pub const GUEST_EMAIL_PREFIX: &str = "guest_";

/// Generated login for a guest account, returned once at activation.
#[derive(Debug, Clone)]
pub struct GuestCredentials {
    pub email: String,
    pub password: String,
}

impl GuestCredentials {
    /// `guest_<16 hex>@<domain>` with a 32 hex character password.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, email_domain: &str) -> Self {
        let local: [u8; 8] = rng.gen();
        let secret: [u8; 16] = rng.gen();
        Self {
            email: format!("{}{}@{}", GUEST_EMAIL_PREFIX, hex::encode(local), email_domain),
            password: hex::encode(secret),
        }
    }
}

pub fn is_guest_email(email: &str, email_domain: &str) -> bool {
    email.starts_with(GUEST_EMAIL_PREFIX) && email.ends_with(&format!("@{}", email_domain))
}

/// Coarse device class from a User-Agent, used when the client sends none.
pub fn detect_device_type(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
        "mobile"
    } else {
        "desktop"
    }
}
