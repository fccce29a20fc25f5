//! JWT token generation and verification.

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCustomClaims {
    pub token_id: String,
}

#[derive(Debug, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_guest(&self) -> bool {
        self.role() == Some(Role::Guest)
    }
}

#[derive(Debug, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub token_id: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Expects JWT_PRIVATE_KEY env var (base64-encoded Ed25519 key).
    pub fn from_env_with_expiry(
        access_token_expiry: i64,
        refresh_token_expiry: i64,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Self {
        use base64::Engine;

        let private_key_b64 =
            std::env::var("JWT_PRIVATE_KEY").expect("JWT_PRIVATE_KEY must be set");

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&private_key_b64)
            .expect("JWT_PRIVATE_KEY must be valid base64");

        let key_pair = Ed25519KeyPair::from_bytes(&key_bytes)
            .expect("JWT_PRIVATE_KEY must be a valid Ed25519 key");

        let mut config = Self::from_key_pair(key_pair);
        config.access_token_expiry = access_token_expiry;
        config.refresh_token_expiry = refresh_token_expiry;
        config.issuer = issuer;
        config.audience = audience;
        config
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: None,
            audience: None,
        }
    }

    pub fn generate_key_pair() -> (String, String) {
        use base64::Engine;

        let key_pair = Ed25519KeyPair::generate();
        let private_b64 = base64::engine::general_purpose::STANDARD.encode(key_pair.to_bytes());
        let public_b64 =
            base64::engine::general_purpose::STANDARD.encode(key_pair.public_key().to_bytes());
        (private_b64, public_b64)
    }

    fn stamp<T>(&self, mut claims: JWTClaims<T>) -> JWTClaims<T> {
        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }
        claims
    }

    fn verification_options(&self) -> VerificationOptions {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from([audience.clone()]));
        }
        options
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<String, jwt_simple::Error> {
        let custom_claims = AccessClaims {
            email: email.to_string(),
            role: role.as_str().to_string(),
        };

        let claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.access_token_expiry as u64),
        )
        .with_subject(user_id.to_string());

        self.key_pair.sign(self.stamp(claims))
    }

    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, jwt_simple::Error> {
        let custom_claims = RefreshCustomClaims {
            token_id: Uuid::new_v4().to_string(),
        };

        let claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.refresh_token_expiry as u64),
        )
        .with_subject(user_id.to_string());

        self.key_pair.sign(self.stamp(claims))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, jwt_simple::Error> {
        let token_data = self
            .public_key
            .verify_token::<AccessClaims>(token, Some(self.verification_options()))?;

        Ok(Claims {
            sub: token_data.subject.unwrap_or_default(),
            email: token_data.custom.email,
            role: token_data.custom.role,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, jwt_simple::Error> {
        let token_data = self
            .public_key
            .verify_token::<RefreshCustomClaims>(token, Some(self.verification_options()))?;

        Ok(RefreshClaims {
            sub: token_data.subject.unwrap_or_default(),
            token_id: token_data.custom.token_id,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::from_key_pair(Ed25519KeyPair::generate())
    }

    #[test]
    fn test_access_token_carries_role() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = config
            .generate_access_token(user_id, "guest_abc@habitat.guest", Role::Guest)
            .expect("Token generation should succeed");

        let claims = config
            .verify_access_token(&token)
            .expect("Token verification should succeed");

        assert_eq!(claims.user_id(), Some(user_id));
        assert_eq!(claims.email, "guest_abc@habitat.guest");
        assert!(claims.is_guest());
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_admin_role_round_trips() {
        let config = test_config();
        let token = config
            .generate_access_token(Uuid::new_v4(), "admin@habitat.app", Role::Admin)
            .unwrap();
        assert!(config.verify_access_token(&token).unwrap().is_admin());
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let refresh = config.generate_refresh_token(user_id).unwrap();
        let claims = config.verify_refresh_token(&refresh).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(config.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let issuing = test_config();
        let other = test_config();

        let token = issuing
            .generate_access_token(Uuid::new_v4(), "a@b.c", Role::User)
            .unwrap();
        assert!(other.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_issuer_is_enforced() {
        let mut issuing = test_config();
        issuing.issuer = Some("habitat".to_string());
        let token = issuing
            .generate_access_token(Uuid::new_v4(), "a@b.c", Role::User)
            .unwrap();

        let mut verifying = issuing.clone();
        verifying.issuer = Some("someone-else".to_string());
        assert!(verifying.verify_access_token(&token).is_err());
        assert!(issuing.verify_access_token(&token).is_ok());
    }

    #[test]
    fn test_key_generation() {
        use base64::Engine;

        let (private_b64, public_b64) = JwtConfig::generate_key_pair();
        assert!(!public_b64.is_empty());

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&private_b64)
            .unwrap();
        let config = JwtConfig::from_key_pair(Ed25519KeyPair::from_bytes(&key_bytes).unwrap());
        let token = config
            .generate_access_token(Uuid::new_v4(), "a@b.c", Role::User)
            .unwrap();
        assert!(config.verify_access_token(&token).is_ok());
    }
}
