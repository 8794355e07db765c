//! Session Entity
//!
//! Persisted refresh-token record. The row existing is the only thing that
//! makes a refresh token exchangeable.

use chrono::{DateTime, Utc};
use kernel::id::UserId;

/// Refresh-token session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The signed refresh token itself (primary key)
    pub refresh_token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(refresh_token: String, user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        Self {
            refresh_token,
            user_id,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Stored expiry check, independent of the token's own `exp` claim
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
