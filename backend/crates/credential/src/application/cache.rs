//! User cache helpers
//!
//! The cache is best-effort: a failure is reported to a [`CacheObserver`]
//! and never reaches the caller.

use derive_more::Display;
use kernel::id::UserId;

use crate::error::AuthError;

/// Which cache step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CacheOp {
    #[display("read")]
    Read,
    #[display("write")]
    Write,
    #[display("decode")]
    Decode,
    #[display("encode")]
    Encode,
}

/// Receives cache events that are otherwise swallowed
pub trait CacheObserver: Send + Sync {
    fn on_failure(&self, op: CacheOp, key: &str, error: &AuthError);

    fn on_hit(&self, _key: &str) {}

    fn on_miss(&self, _key: &str) {}
}

/// Default observer: cache failures become warnings
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCacheObserver;

impl CacheObserver for TracingCacheObserver {
    fn on_failure(&self, op: CacheOp, key: &str, error: &AuthError) {
        tracing::warn!(%op, key, error = %error, "User cache failure");
    }

    fn on_hit(&self, key: &str) {
        tracing::trace!(key, "User cache hit");
    }

    fn on_miss(&self, key: &str) {
        tracing::trace!(key, "User cache miss");
    }
}

pub fn user_cache_key(id: UserId) -> String {
    format!("user:{id}")
}
