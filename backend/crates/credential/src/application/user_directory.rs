//! User Directory
//!
//! Registration, password login and cached profile look-up.

use std::sync::Arc;

use kernel::id::UserId;
use platform::password::PasswordHasher;
use tokio::time::timeout;

use crate::application::cache::{CacheObserver, CacheOp, TracingCacheObserver, user_cache_key};
use crate::application::config::AuthConfig;
use crate::application::stack::CredentialStack;
use crate::application::token_service::TokenService;
use crate::domain::entity::{
    token::TokenPair,
    user::{NewUser, User, UserProfile},
};
use crate::domain::repository::{CacheStore, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::infra::transaction::Repository;

/// Hashed at construction and verified against when a login names nobody
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

pub struct UserDirectory<K: CredentialStack> {
    users: K::Users,
    cache: K::Cache,
    hasher: Arc<dyn PasswordHasher>,
    decoy_digest: Option<String>,
    tokens: Arc<TokenService<K>>,
    observer: Arc<dyn CacheObserver>,
    config: Arc<AuthConfig>,
}

impl<K: CredentialStack> UserDirectory<K> {
    pub fn new(
        backend: K::Backend,
        cache: K::Cache,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenService<K>>,
    ) -> Self {
        let config = Arc::clone(tokens.config());
        let decoy_digest = hasher
            .hash(DECOY_PASSWORD)
            .inspect_err(|e| tracing::error!(error = %e, "Could not prepare decoy digest"))
            .ok();
        Self {
            users: K::Users::standalone(backend),
            cache,
            hasher,
            decoy_digest,
            tokens,
            observer: Arc::new(TracingCacheObserver),
            config,
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Create an account and sign it in
    ///
    /// Input is expected to be validated already. If token issuance fails
    /// the account stays; the caller can log in afterwards.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<(User, TokenPair)> {
        let password_digest = self.hasher.hash(password)?;

        let user = self
            .users
            .create(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_digest,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        self.cache_profile(&user.profile()).await;

        let pair = self.tokens.create_jwt(user.id).await.inspect_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "Token issuance failed after registration");
        })?;

        Ok((user, pair))
    }

    /// Verify a password against the user named by `login`
    ///
    /// `login` matches a username or an email. Unknown user and wrong
    /// password fail identically, and both pay for one digest verification.
    pub async fn login(&self, login: &str, password: &str) -> AuthResult<(User, TokenPair)> {
        let Some(user) = self.users.get_by_login(login).await? else {
            if let Some(decoy) = &self.decoy_digest {
                self.hasher.verify(decoy, password);
            }
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(&user.password_digest, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.tokens.create_jwt(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok((user, pair))
    }

    /// Cache-aside profile look-up
    ///
    /// A cache hit never touches the store; a cache failure falls back to it.
    pub async fn get(&self, id: UserId) -> AuthResult<UserProfile> {
        if let Some(profile) = self.read_cached(id).await {
            return Ok(profile);
        }

        let profile = self
            .users
            .get(id)
            .await?
            .ok_or(AuthError::UserNotFound)?
            .profile();

        self.cache_profile(&profile).await;

        Ok(profile)
    }

    async fn read_cached(&self, id: UserId) -> Option<UserProfile> {
        let key = user_cache_key(id);

        let raw = match timeout(self.config.cache_timeout, self.cache.get(&key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                self.observer.on_miss(&key);
                return None;
            }
            Ok(Err(e)) => {
                self.observer.on_failure(CacheOp::Read, &key, &e);
                return None;
            }
            Err(_) => {
                let e = AuthError::Cache("read timed out".to_string());
                self.observer.on_failure(CacheOp::Read, &key, &e);
                return None;
            }
        };

        match serde_json::from_str::<UserProfile>(&raw) {
            Ok(profile) => {
                self.observer.on_hit(&key);
                Some(profile)
            }
            Err(e) => {
                let e = AuthError::Cache(e.to_string());
                self.observer.on_failure(CacheOp::Decode, &key, &e);
                None
            }
        }
    }

    async fn cache_profile(&self, profile: &UserProfile) {
        let key = user_cache_key(profile.id);

        let raw = match serde_json::to_string(profile) {
            Ok(raw) => raw,
            Err(e) => {
                let e = AuthError::Cache(e.to_string());
                self.observer.on_failure(CacheOp::Encode, &key, &e);
                return;
            }
        };

        let write = self.cache.set(&key, raw, self.config.user_cache_ttl);
        match timeout(self.config.cache_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.observer.on_failure(CacheOp::Write, &key, &e),
            Err(_) => {
                let e = AuthError::Cache("write timed out".to_string());
                self.observer.on_failure(CacheOp::Write, &key, &e);
            }
        }
    }
}
