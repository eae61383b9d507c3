//! HS256 bearer tokens.
//!
//! Expiry is carried in the `expires_at` claim and checked by
//! [`validate_claims`], so the library's own `exp` handling is turned off.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use oficina_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Mints bearer tokens for authenticated users.
pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        sub: UserId,
        name: &str,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenIssueError>;
}

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

fn hs256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: hs256_validation(),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

pub struct Hs256TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl Hs256TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl TokenIssuer for Hs256TokenIssuer {
    fn issue(
        &self,
        sub: UserId,
        name: &str,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenIssueError> {
        let claims = JwtClaims {
            sub,
            name: name.to_string(),
            roles,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}
