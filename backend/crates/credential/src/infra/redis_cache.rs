//! Redis Cache
//!
//! Shared TTL cache for deployments with more than one replica. Expiry is
//! left to Redis (`SETEX`).

use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::domain::repository::CacheStore;
use crate::error::{AuthError, AuthResult};

/// Redis-backed [`CacheStore`]
///
/// The connection is established on first use, so the service starts while
/// Redis is down. Callers bound every call with their own timeout.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    conn: Arc<Mutex<Option<ConnectionManager>>>,
}

impl RedisCache {
    /// Parse `url`; no connection is made yet
    pub fn open(url: &str) -> AuthResult<Self> {
        let client = redis::Client::open(url).map_err(cache_error)?;
        Ok(Self {
            client,
            conn: Arc::new(Mutex::new(None)),
        })
    }

    async fn connection(&self) -> AuthResult<ConnectionManager> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(cache_error)?;
        tracing::info!("Connected to Redis");

        *slot = Some(conn.clone());
        Ok(conn)
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

fn cache_error(err: redis::RedisError) -> AuthError {
    AuthError::Cache(err.to_string())
}

/// `SETEX` takes whole seconds and rejects zero
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(cache_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex(key, value, expiry_secs(ttl))
            .await
            .map_err(cache_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_expiry_is_whole_seconds_and_never_zero() {
        assert_eq!(expiry_secs(Duration::from_secs(60)), 60);
        assert_eq!(expiry_secs(Duration::from_millis(1500)), 1);
        assert_eq!(expiry_secs(Duration::from_millis(200)), 1);
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(matches!(RedisCache::open("http://localhost"), Err(AuthError::Cache(_))));
        assert!(RedisCache::open("redis://127.0.0.1:6379").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_never_yields_a_value() {
        let cache = RedisCache::open("redis://127.0.0.1:1/").unwrap();

        let outcome = timeout(Duration::from_secs(2), cache.get("user:1")).await;
        assert!(!matches!(outcome, Ok(Ok(_))));
    }

    /// Runs against a live server when `REDIS_URL` is set
    #[tokio::test]
    async fn test_round_trip_against_live_server() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let cache = RedisCache::open(&url).unwrap();
        let key = format!("user:test:{}", uuid::Uuid::new_v4());

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, "v".into(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("v"));
    }
}
