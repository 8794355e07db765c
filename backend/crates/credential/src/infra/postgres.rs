//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::application::stack::CredentialStack;
use crate::domain::entity::{
    session::Session,
    user::{NewUser, User},
};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::infra::redis_cache::RedisCache;
use crate::infra::transaction::{Backend, Executor, Repository};

/// PostgreSQL connection pool as a transactional backend
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Backend for PgDatabase {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> AuthResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> AuthResult<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> AuthResult<()> {
        Ok(tx.rollback().await?)
    }
}

/// Production wiring: Postgres stores with the shared Redis user cache
pub enum PgStack {}

impl CredentialStack for PgStack {
    type Backend = PgDatabase;
    type Users = PgUserStore;
    type Sessions = PgSessionStore;
    type Cache = RedisCache;
}

// ============================================================================
// User Repository Implementation
// ============================================================================

#[derive(Clone)]
pub struct PgUserStore {
    executor: Executor<PgDatabase>,
}

impl Repository<PgDatabase> for PgUserStore {
    fn with_executor(executor: Executor<PgDatabase>) -> Self {
        Self { executor }
    }
}

impl UserRepository for PgUserStore {
    async fn create(&self, user: &NewUser) -> AuthResult<User> {
        let mut scope = self.executor.scope().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_digest)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_digest, admin, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_digest)
        .fetch_one(&mut **scope.tx()?)
        .await?;

        scope.finish().await?;
        Ok(row.into())
    }

    async fn get(&self, id: UserId) -> AuthResult<Option<User>> {
        let mut scope = self.executor.scope().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_digest, admin, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut **scope.tx()?)
        .await?;

        scope.finish().await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_login(&self, login: &str) -> AuthResult<Option<User>> {
        let mut scope = self.executor.scope().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_digest, admin, created_at, updated_at
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(&mut **scope.tx()?)
        .await?;

        scope.finish().await?;
        Ok(row.map(Into::into))
    }

    async fn save(&self, user: &User) -> AuthResult<User> {
        let mut scope = self.executor.scope().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2,
                email = $3,
                password_digest = $4,
                admin = $5,
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password_digest, admin, created_at, updated_at
            "#,
        )
        .bind(user.id.as_i64())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.admin)
        .fetch_optional(&mut **scope.tx()?)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        scope.finish().await?;
        Ok(row.into())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

#[derive(Clone)]
pub struct PgSessionStore {
    executor: Executor<PgDatabase>,
}

impl Repository<PgDatabase> for PgSessionStore {
    fn with_executor(executor: Executor<PgDatabase>) -> Self {
        Self { executor }
    }
}

impl SessionRepository for PgSessionStore {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        let mut scope = self.executor.scope().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (refresh_token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.refresh_token)
        .bind(session.user_id.as_i64())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&mut **scope.tx()?)
        .await?;

        scope.finish().await
    }

    async fn get(&self, refresh_token: &str) -> AuthResult<Option<Session>> {
        let mut scope = self.executor.scope().await?;

        // Row lock is held until the enclosing unit of work finishes
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT refresh_token, user_id, expires_at, created_at
            FROM sessions
            WHERE refresh_token = $1
            FOR UPDATE
            "#,
        )
        .bind(refresh_token)
        .fetch_optional(&mut **scope.tx()?)
        .await?;

        scope.finish().await?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, refresh_token: &str) -> AuthResult<bool> {
        let mut scope = self.executor.scope().await?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE refresh_token = $1")
            .bind(refresh_token)
            .execute(&mut **scope.tx()?)
            .await?
            .rows_affected();

        scope.finish().await?;
        Ok(deleted > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut scope = self.executor.scope().await?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&mut **scope.tx()?)
            .await?
            .rows_affected();

        scope.finish().await?;

        tracing::info!(sessions_deleted = deleted, "Purged expired sessions");

        Ok(deleted)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_digest: String,
    admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_i64(row.id),
            username: row.username,
            email: row.email,
            password_digest: row.password_digest,
            admin: row.admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    refresh_token: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            refresh_token: row.refresh_token,
            user_id: UserId::from_i64(row.user_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_conversion() {
        let now = Utc::now();
        let user: User = UserRow {
            id: 42,
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_digest: "digest".into(),
            admin: true,
            created_at: now,
            updated_at: now,
        }
        .into();

        assert_eq!(user.id, UserId::from_i64(42));
        assert!(user.admin);
        assert_eq!(user.password_digest, "digest");
    }

    #[test]
    fn test_session_row_conversion() {
        let now = Utc::now();
        let session: Session = SessionRow {
            refresh_token: "rt".into(),
            user_id: 7,
            expires_at: now,
            created_at: now,
        }
        .into();

        assert_eq!(session.user_id, UserId::from_i64(7));
        assert_eq!(session.refresh_token, "rt");
    }
}
