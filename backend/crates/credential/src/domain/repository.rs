//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer and are bound to one execution mode (standalone or
//! joined to a unit of work) for their whole lifetime.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::entity::{
    session::Session,
    user::{NewUser, User},
};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a user; the store assigns id and timestamps.
    /// Duplicate username or email fails with `AuthError::Conflict`.
    async fn create(&self, user: &NewUser) -> AuthResult<User>;

    /// Find user by ID
    async fn get(&self, id: UserId) -> AuthResult<Option<User>>;

    /// Find user whose username or email equals `login` (case as stored).
    /// A username match wins over an email match.
    async fn get_by_login(&self, login: &str) -> AuthResult<Option<User>>;

    /// Persist every mutable field and bump `updated_at`
    async fn save(&self, user: &User) -> AuthResult<User>;
}

/// Refresh-token session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Insert a session row
    async fn create(&self, session: &Session) -> AuthResult<()>;

    /// Find the row for a refresh token. Inside a unit of work the row stays
    /// locked until the work finishes.
    async fn get(&self, refresh_token: &str) -> AuthResult<Option<Session>>;

    /// Delete the row for a refresh token; `false` when nothing was deleted
    async fn delete(&self, refresh_token: &str) -> AuthResult<bool>;

    /// Delete rows whose stored expiry is before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Best-effort key-value cache
#[trait_variant::make(CacheStore: Send)]
pub trait LocalCacheStore {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AuthResult<()>;
}
