//! Token Service
//!
//! Issues, verifies, rotates and revokes HS256 token pairs. Every refresh
//! token issued has exactly one session row; rotation replaces that row
//! inside a single unit of work, so a refresh token is redeemable once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::id::UserId;
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::application::stack::CredentialStack;
use crate::domain::entity::{
    session::Session,
    token::{Claims, Token, TokenPair, TokenUse},
};
use crate::domain::repository::SessionRepository;
use crate::error::{AuthError, AuthResult};
use crate::infra::transaction::{Repository, TransactionCoordinator, WorkHandle};

pub struct TokenService<K: CredentialStack> {
    coordinator: TransactionCoordinator<K::Backend>,
    sessions: K::Sessions,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: Arc<AuthConfig>,
}

impl<K: CredentialStack> TokenService<K> {
    pub fn new(backend: K::Backend, config: Arc<AuthConfig>) -> AuthResult<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.clock_leeway.as_secs();
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            coordinator: TransactionCoordinator::new(backend.clone()),
            sessions: K::Sessions::standalone(backend),
            encoding_key: EncodingKey::from_secret(&config.jwt_secret),
            decoding_key: DecodingKey::from_secret(&config.jwt_secret),
            validation,
            config,
        })
    }

    pub fn config(&self) -> &Arc<AuthConfig> {
        &self.config
    }

    /// Mint a fresh pair and record its session
    pub async fn create_jwt(&self, user_id: UserId) -> AuthResult<TokenPair> {
        let (pair, session) = self.mint_pair(user_id)?;
        self.sessions.create(&session).await?;

        tracing::info!(user_id = %user_id, "Issued token pair");

        Ok(pair)
    }

    /// Same as [`Self::create_jwt`], recording the session inside `work`
    pub async fn create_jwt_in(
        &self,
        user_id: UserId,
        work: &WorkHandle<K::Backend>,
    ) -> AuthResult<TokenPair> {
        let (pair, session) = self.mint_pair(user_id)?;
        K::Sessions::joined(work).create(&session).await?;
        Ok(pair)
    }

    /// Verify signature, algorithm, expiry and that `token` is an access
    /// token; no storage access
    pub fn authenticate_jwt(&self, token: &str) -> AuthResult<UserId> {
        self.verify(token, TokenUse::Access)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Look-up, delete of the old session and insert of the new one commit
    /// together or not at all. Of several concurrent calls with the same
    /// token, at most one succeeds.
    pub async fn refresh_jwt(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let subject = self.verify(refresh_token, TokenUse::Refresh)?;

        let work = self.coordinator.begin().await?;
        let result = self.rotate(&work, refresh_token, subject).await;
        let pair = work.finish(result).await?;

        tracing::info!(user_id = %subject, "Rotated refresh token");

        Ok(pair)
    }

    /// Revoke a refresh token; unknown tokens are not an error
    pub async fn logout_jwt(&self, refresh_token: &str) -> AuthResult<()> {
        let removed = self.sessions.delete(refresh_token).await?;

        tracing::info!(removed, "Revoked refresh token");

        Ok(())
    }

    async fn rotate(
        &self,
        work: &WorkHandle<K::Backend>,
        refresh_token: &str,
        subject: UserId,
    ) -> AuthResult<TokenPair> {
        let sessions = K::Sessions::joined(work);

        let Some(session) = sessions.get(refresh_token).await? else {
            tracing::warn!(user_id = %subject, "Refresh token has no session");
            return Err(AuthError::InvalidToken);
        };

        if session.user_id != subject {
            tracing::warn!(
                user_id = %subject,
                session_user_id = %session.user_id,
                "Refresh token subject does not match its session"
            );
            return Err(AuthError::InvalidToken);
        }

        if session.is_expired_at(Utc::now()) {
            tracing::warn!(user_id = %subject, "Refresh session expired");
            return Err(AuthError::InvalidToken);
        }

        let (pair, next) = self.mint_pair(session.user_id)?;

        if !sessions.delete(refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }
        sessions.create(&next).await?;

        Ok(pair)
    }

    fn mint_pair(&self, user_id: UserId) -> AuthResult<(TokenPair, Session)> {
        let access_token = self.sign(user_id, TokenUse::Access, self.config.access_token_ttl)?;
        let refresh_token =
            self.sign(user_id, TokenUse::Refresh, self.config.refresh_token_ttl)?;

        let session = Session::new(
            refresh_token.token.clone(),
            user_id,
            refresh_token.expires_at,
        );

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            session,
        ))
    }

    fn sign(&self, user_id: UserId, typ: TokenUse, ttl: Duration) -> AuthResult<Token> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal(format!("{typ} token TTL out of range")))?;

        let sub = u64::try_from(user_id.as_i64())
            .map_err(|_| AuthError::Internal(format!("user id {user_id} is not a valid subject")))?;

        let claims = Claims {
            sub,
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
            typ,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))?;

        Ok(Token { token, expires_at })
    }

    fn verify(&self, token: &str, expected: TokenUse) -> AuthResult<UserId> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            AuthError::InvalidToken
        })?;

        if data.claims.typ != expected {
            tracing::warn!(
                expected = %expected,
                actual = %data.claims.typ,
                "Token presented for the wrong use"
            );
            return Err(AuthError::InvalidToken);
        }

        let id = i64::try_from(data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(UserId::from_i64(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::user::NewUser;
    use crate::domain::repository::UserRepository;
    use crate::infra::memory::{MemoryDatabase, MemorySessionStore, MemoryStack, MemoryUserStore};

    async fn setup() -> (TokenService<MemoryStack>, MemoryDatabase, UserId) {
        let db = MemoryDatabase::new();
        let user = MemoryUserStore::standalone(db.clone())
            .create(&NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                password_digest: "d".into(),
            })
            .await
            .unwrap();
        let service =
            TokenService::new(db.clone(), Arc::new(AuthConfig::with_random_secret())).unwrap();
        (service, db, user.id)
    }

    #[tokio::test]
    async fn test_new_rejects_weak_secret() {
        let db = MemoryDatabase::new();
        let result =
            TokenService::<MemoryStack>::new(db, Arc::new(AuthConfig::with_secret("short")));
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn test_create_records_session() {
        let (service, db, user_id) = setup().await;

        let pair = service.create_jwt(user_id).await.unwrap();
        assert_ne!(pair.access_token.token, pair.refresh_token.token);
        assert!(pair.access_token.expires_at < pair.refresh_token.expires_at);

        let session = MemorySessionStore::standalone(db)
            .get(&pair.refresh_token.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.expires_at, pair.refresh_token.expires_at);
    }

    #[tokio::test]
    async fn test_pairs_are_unique() {
        let (service, _, user_id) = setup().await;

        let a = service.create_jwt(user_id).await.unwrap();
        let b = service.create_jwt(user_id).await.unwrap();
        assert_ne!(a.refresh_token.token, b.refresh_token.token);
        assert_ne!(a.access_token.token, b.access_token.token);
    }

    #[tokio::test]
    async fn test_token_kinds_are_not_interchangeable() {
        let (service, db, user_id) = setup().await;
        let pair = service.create_jwt(user_id).await.unwrap();

        assert_eq!(service.authenticate_jwt(&pair.access_token.token).unwrap(), user_id);
        assert!(matches!(
            service.authenticate_jwt(&pair.refresh_token.token),
            Err(AuthError::InvalidToken)
        ));

        assert!(matches!(
            service.refresh_jwt(&pair.access_token.token).await,
            Err(AuthError::InvalidToken)
        ));
        assert_eq!(db.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_not_a_credential() {
        let (service, _, user_id) = setup().await;
        let pair = service.create_jwt(user_id).await.unwrap();

        service.logout_jwt(&pair.refresh_token.token).await.unwrap();
        assert!(service.authenticate_jwt(&pair.refresh_token.token).is_err());
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_an_error() {
        let db = MemoryDatabase::new();
        let mut config = AuthConfig::with_random_secret();
        config.refresh_token_ttl = Duration::from_secs(60 * 60 * 24 * 365 * 1_000_000);
        let service = TokenService::<MemoryStack>::new(db.clone(), Arc::new(config)).unwrap();

        let result = service.create_jwt(UserId::from_i64(1)).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
        assert_eq!(db.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let (service, db, user_id) = setup().await;
        let first = service.create_jwt(user_id).await.unwrap();

        let second = service.refresh_jwt(&first.refresh_token.token).await.unwrap();
        assert_ne!(second.refresh_token.token, first.refresh_token.token);
        assert_eq!(db.session_count().await, 1);

        assert!(matches!(
            service.refresh_jwt(&first.refresh_token.token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(service.refresh_jwt(&second.refresh_token.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, db, user_id) = setup().await;
        let pair = service.create_jwt(user_id).await.unwrap();

        service.logout_jwt(&pair.refresh_token.token).await.unwrap();
        service.logout_jwt(&pair.refresh_token.token).await.unwrap();
        service.logout_jwt("never-issued").await.unwrap();

        assert_eq!(db.session_count().await, 0);
        assert!(matches!(
            service.refresh_jwt(&pair.refresh_token.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_create_in_commits_with_work() {
        let (service, db, user_id) = setup().await;
        let coordinator = TransactionCoordinator::new(db.clone());

        let work = coordinator.begin().await.unwrap();
        service.create_jwt_in(user_id, &work).await.unwrap();
        work.rollback().await.unwrap();
        assert_eq!(db.session_count().await, 0);

        let work = coordinator.begin().await.unwrap();
        service.create_jwt_in(user_id, &work).await.unwrap();
        work.commit().await.unwrap();
        assert_eq!(db.session_count().await, 1);
    }
}
