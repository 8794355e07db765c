//! Password Hashing and Verification
//!
//! The credential core only sees the [`PasswordHasher`] capability:
//! `hash(secret) -> digest` and `verify(digest, secret) -> bool`.
//! [`Argon2Hasher`] is the production implementation.
//!
//! ## Security Features
//! - Memory-hard Argon2id with a random 128-bit salt per digest
//! - Optional application-wide pepper
//! - NFKC normalization so visually identical input verifies identically
//! - Secret bytes are zeroized after use

use std::fmt;

use argon2::{
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _, password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// Minimum password length (NIST: SHALL be at least 8)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (NIST: SHOULD permit at least 64)
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password contains invalid control characters")]
    InvalidCharacter,
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

/// Check a raw password against the length and character policy
///
/// Length is counted in Unicode code points after NFKC normalization.
pub fn check_policy(raw: &str) -> Result<(), PasswordPolicyError> {
    let normalized: Zeroizing<String> = Zeroizing::new(raw.nfkc().collect());
    let actual = normalized.chars().count();

    if actual < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort {
            min: MIN_PASSWORD_LENGTH,
            actual,
        });
    }
    if actual > MAX_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooLong {
            max: MAX_PASSWORD_LENGTH,
            actual,
        });
    }
    if normalized
        .chars()
        .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
    {
        return Err(PasswordPolicyError::InvalidCharacter);
    }

    Ok(())
}

/// Opaque password digest capability
///
/// `verify` never distinguishes "malformed digest" from "wrong password";
/// both are simply `false`.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, PasswordHashError>;

    fn verify(&self, digest: &str, secret: &str) -> bool;
}

/// Argon2id hasher producing PHC-formatted digests
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    pepper: Option<Zeroizing<Vec<u8>>>,
}

impl Argon2Hasher {
    pub fn new(pepper: Option<Vec<u8>>) -> Self {
        Self {
            pepper: pepper.filter(|p| !p.is_empty()).map(Zeroizing::new),
        }
    }

    /// Normalized secret followed by the pepper
    fn material(&self, secret: &str) -> Zeroizing<Vec<u8>> {
        let normalized: Zeroizing<String> = Zeroizing::new(secret.nfkc().collect());
        let mut bytes = Zeroizing::new(normalized.as_bytes().to_vec());
        if let Some(pepper) = &self.pepper {
            bytes.extend_from_slice(pepper);
        }
        bytes
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);

        // OWASP recommended Argon2id parameters:
        // m=19456 (19 MiB), t=2, p=1
        let digest = Argon2::default()
            .hash_password(&self.material(secret), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(digest.to_string())
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        // Argon2 compares in constant time internally
        Argon2::default()
            .verify_password(&self.material(secret), &parsed)
            .is_ok()
    }
}

impl fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("pepper", &self.pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
