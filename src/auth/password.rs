//! Password hashing with Argon2id.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
        }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize, require_complexity: bool) -> Self {
        Self {
            min_length,
            require_uppercase: require_complexity,
            require_lowercase: require_complexity,
            require_digit: require_complexity,
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(PasswordPolicyError::MissingUppercase);
        }

        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(PasswordPolicyError::MissingLowercase);
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min_length} characters")]
    TooShort { min_length: usize },
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
}

pub struct PasswordService;

impl PasswordService {
    /// Hashes with Argon2id using `2^memory_cost_log2` KiB of memory.
    ///
    /// Guest accounts are hashed with the same cost as regular accounts so a
    /// claimed account needs no rehash.
    pub fn hash_password_with_cost(
        password: &str,
        memory_cost_log2: u32,
    ) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);

        // Capped at 4 GiB.
        let m_cost = 1u32 << memory_cost_log2.min(22);

        let params =
            Params::new(m_cost, 3, 1, None).map_err(|_| argon2::password_hash::Error::Algorithm)?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    pub fn verify_password(
        password: &str,
        password_hash: &str,
    ) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(password_hash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = PasswordService::hash_password_with_cost("Otters4ever", 4)
            .expect("Hashing should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordService::verify_password("Otters4ever", &hash).unwrap());
        assert!(!PasswordService::verify_password("otters4ever", &hash).unwrap());
    }

    #[test]
    fn test_unique_salts() {
        let hash1 = PasswordService::hash_password_with_cost("same_password", 4).unwrap();
        let hash2 = PasswordService::hash_password_with_cost("same_password", 4).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(PasswordService::verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_default_policy_only_checks_length() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("password").is_ok());
        assert!(matches!(
            policy.validate("short"),
            Err(PasswordPolicyError::TooShort { min_length: 8 })
        ));
    }

    #[test]
    fn test_complex_policy() {
        let policy = PasswordPolicy::new(8, true);

        assert!(matches!(
            policy.validate("password1"),
            Err(PasswordPolicyError::MissingUppercase)
        ));
        assert!(matches!(
            policy.validate("PASSWORD1"),
            Err(PasswordPolicyError::MissingLowercase)
        ));
        assert!(matches!(
            policy.validate("Password"),
            Err(PasswordPolicyError::MissingDigit)
        ));
        assert!(policy.validate("Password1").is_ok());
    }

    #[test]
    fn test_policy_error_message_mentions_length() {
        let err = PasswordPolicy::new(10, false).validate("short").unwrap_err();
        assert!(err.to_string().contains("10 characters"));
    }
}
