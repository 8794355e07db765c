//! In-Process Cache
//!
//! TTL key-value store on a concurrent map, for the in-memory stack and tests. Entries expire lazily on read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::domain::repository::CacheStore;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    offline: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_online(&self) -> AuthResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Cache("cache unreachable".to_string()));
        }
        Ok(())
    }
}

impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.ensure_online()?;

        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AuthResult<()> {
        self.ensure_online()?;

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache.set("user:1", "v".into(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("user:1").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("user:2").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let cache = MemoryCache::new();
        cache.set_offline(true);

        assert!(matches!(cache.get("k").await, Err(AuthError::Cache(_))));
        assert!(matches!(
            cache.set("k", "v".into(), Duration::from_secs(1)).await,
            Err(AuthError::Cache(_))
        ));
    }
}
