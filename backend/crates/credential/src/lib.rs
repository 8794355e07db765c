//! Credential Lifecycle Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities and repository traits
//! - `application/` - Token service, user directory, configuration
//! - `infra/` - Unit of work, Postgres and in-memory stores, cache
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Registration and login by username or email
//! - HS256 access/refresh token pairs
//! - Single-use refresh tokens rotated inside one transaction
//! - Cache-aside user profile look-up
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (optional pepper)
//! - Only HS256 tokens are accepted; `exp` is always checked
//! - Each refresh token is backed by exactly one session row
//! - Login failures never reveal whether the user exists

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use application::{
    AuthConfig, CacheObserver, CacheOp, CredentialStack, TokenService, TracingCacheObserver,
    UserDirectory,
};
pub use error::{AuthError, AuthResult};
pub use infra::{
    MemoryCache, MemoryDatabase, MemoryStack, PgDatabase, PgStack, RedisCache, Repository,
    TransactionCoordinator, WorkHandle,
};
pub use presentation::{AuthAppState, credential_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::presentation::dto::*;
}
