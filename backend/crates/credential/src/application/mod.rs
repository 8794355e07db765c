//! Application Layer
//!
//! Services orchestrating stores, tokens and the cache.

pub mod cache;
pub mod config;
pub mod stack;
pub mod token_service;
pub mod user_directory;

pub use cache::{CacheObserver, CacheOp, TracingCacheObserver};
pub use config::AuthConfig;
pub use stack::CredentialStack;
pub use token_service::TokenService;
pub use user_directory::UserDirectory;
