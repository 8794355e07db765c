//! Infrastructure Layer
//!
//! Unit-of-work plumbing, store implementations and the caches.

pub mod cache;
pub mod memory;
pub mod postgres;
pub mod redis_cache;
pub mod transaction;

pub use cache::MemoryCache;
pub use memory::{MemoryDatabase, MemorySessionStore, MemoryStack, MemoryUserStore};
pub use postgres::{PgDatabase, PgSessionStore, PgStack, PgUserStore};
pub use redis_cache::RedisCache;
pub use transaction::{Backend, Executor, Repository, TransactionCoordinator, WorkHandle};
