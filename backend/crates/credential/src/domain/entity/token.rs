//! Token value objects
//!
//! Tokens are never persisted as such; only the refresh token string ends up
//! as a session key.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed compact token plus its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access + refresh tokens minted together for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
}

/// Which half of a pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    #[display("access")]
    Access,
    #[display("refresh")]
    Refresh,
}

/// Claims carried by every token
///
/// Decoding fails closed: a missing claim, an unknown `typ` or a `sub` that
/// is not an unsigned integer rejects the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id
    pub sub: u64,
    /// Unix seconds
    pub exp: i64,
    /// Random per-token id; keeps same-second refresh tokens distinct
    pub jti: Uuid,
    pub typ: TokenUse,
}
