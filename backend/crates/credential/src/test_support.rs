//! Shared fixtures for unit and scenario tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use platform::password::{PasswordHashError, PasswordHasher};

use crate::application::cache::{CacheObserver, CacheOp};
use crate::application::{AuthConfig, TokenService, UserDirectory};
use crate::error::AuthError;
use crate::infra::{MemoryCache, MemoryDatabase, MemoryStack};
use crate::presentation::AuthAppState;

/// Reversible "hash" so tests don't pay for Argon2
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        Ok(format!("plain${password}"))
    }

    fn verify(&self, digest: &str, password: &str) -> bool {
        digest.strip_prefix("plain$") == Some(password)
    }
}

/// [`PlainHasher`] that counts verifications
#[derive(Default)]
pub struct CountingHasher {
    verifications: AtomicUsize,
}

impl CountingHasher {
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        PlainHasher.hash(password)
    }

    fn verify(&self, digest: &str, password: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        PlainHasher.verify(digest, password)
    }
}

/// Observer that remembers every event
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        self.events().iter().filter(|e| e.starts_with("failure")).count()
    }
}

impl CacheObserver for RecordingObserver {
    fn on_failure(&self, op: CacheOp, key: &str, _error: &AuthError) {
        self.events.lock().unwrap().push(format!("failure {op} {key}"));
    }

    fn on_hit(&self, key: &str) {
        self.events.lock().unwrap().push(format!("hit {key}"));
    }

    fn on_miss(&self, key: &str) {
        self.events.lock().unwrap().push(format!("miss {key}"));
    }
}

/// Everything wired in memory
pub struct Harness {
    pub db: MemoryDatabase,
    pub cache: MemoryCache,
    pub observer: Arc<RecordingObserver>,
    pub tokens: Arc<TokenService<MemoryStack>>,
    pub users: Arc<UserDirectory<MemoryStack>>,
    pub config: Arc<AuthConfig>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::development())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        Self::with_hasher(config, Arc::new(PlainHasher))
    }

    pub fn with_hasher(config: AuthConfig, hasher: Arc<dyn PasswordHasher>) -> Self {
        let config = Arc::new(config);
        let db = MemoryDatabase::new();
        let cache = MemoryCache::new();
        let observer = Arc::new(RecordingObserver::default());

        let tokens = Arc::new(TokenService::new(db.clone(), Arc::clone(&config)).unwrap());
        let users = Arc::new(
            UserDirectory::new(db.clone(), cache.clone(), hasher, Arc::clone(&tokens))
                .with_observer(observer.clone()),
        );

        Self {
            db,
            cache,
            observer,
            tokens,
            users,
            config,
        }
    }

    pub fn state(&self) -> AuthAppState<MemoryStack> {
        AuthAppState::new(Arc::clone(&self.users), Arc::clone(&self.tokens))
    }
}
