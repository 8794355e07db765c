//! Application Configuration
//!
//! Configuration for the credential application layer.

use std::fmt;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Shortest HMAC key accepted for token signing
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// SameSite attribute for the access-token cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Credential application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 key shared by every token
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token and session lifetime (30 days)
    pub refresh_token_ttl: Duration,
    /// Clock skew tolerated on `exp`
    pub clock_leeway: Duration,
    /// Lifetime of a cached user profile
    pub user_cache_ttl: Duration,
    /// Upper bound on any single cache call
    pub cache_timeout: Duration,
    /// Cookie carrying the access token
    pub cookie_name: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            clock_leeway: Duration::ZERO,
            user_cache_ttl: Duration::from_secs(60),
            cache_timeout: Duration::from_millis(250),
            cookie_name: "Authorization".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("clock_leeway", &self.clock_leeway)
            .field("user_cache_ttl", &self.user_cache_ttl)
            .field("cache_timeout", &self.cache_timeout)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AuthConfig {
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Default::default()
        }
    }

    /// Create config with a random signing key (for development)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = vec![0u8; MIN_JWT_SECRET_LEN];
        rand::rng().fill_bytes(&mut secret);
        Self::with_secret(secret)
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AuthError::Internal(format!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.access_token_ttl.is_zero() || self.refresh_token_ttl.is_zero() {
            return Err(AuthError::Internal("token TTLs must be positive".to_string()));
        }
        if self.access_token_ttl >= self.refresh_token_ttl {
            return Err(AuthError::Internal(
                "access token TTL must be shorter than refresh token TTL".to_string(),
            ));
        }
        Ok(())
    }
}
