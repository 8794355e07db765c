//! Domain Layer
//!
//! Contains entities and repository traits.

pub mod entity;
pub mod repository;

// Re-exports
pub use entity::{
    session::Session,
    token::{Claims, Token, TokenPair, TokenUse},
    user::{NewUser, User, UserProfile},
};
pub use kernel::id::UserId;
pub use repository::{CacheStore, SessionRepository, UserRepository};
