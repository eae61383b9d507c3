//! Password hashing (argon2id, PHC string format).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;
use uuid::Uuid;

pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("senha deve ter no mínimo {} caracteres", MIN_PASSWORD_CHARS)]
    TooShort,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub fn check_password_policy(plain: &str) -> Result<(), PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_CHARS {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hash `plain` after checking the length policy.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    check_password_policy(plain)?;
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// `false` for a wrong password and for an unparseable stored hash.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("segredo123").unwrap();
        assert!(verify_password("segredo123", &hash));
        assert!(!verify_password("segredo124", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("segredo123").unwrap(), hash_password("segredo123").unwrap());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(hash_password("12345"), Err(PasswordError::TooShort));
        assert!(check_password_policy("123456").is_ok());
    }

    #[test]
    fn corrupt_hash_never_verifies() {
        assert!(!verify_password("segredo123", "not-a-phc-string"));
    }
}
