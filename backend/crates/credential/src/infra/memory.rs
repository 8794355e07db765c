//! In-Memory Repository Implementations
//!
//! A transactional store held in process memory. A transaction works on a
//! staged copy of every table and holds the table lock until it finishes, so
//! transactions run one at a time and an unfinished one leaves no trace.
//! Used by tests and local development without Postgres.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::stack::CredentialStack;
use crate::domain::entity::{
    session::Session,
    user::{NewUser, User},
};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::infra::cache::MemoryCache;
use crate::infra::transaction::{Backend, Executor, Repository};

#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    last_user_id: i64,
    users: BTreeMap<i64, User>,
    sessions: HashMap<String, Session>,
}

impl MemoryTables {
    fn ensure_unique(&self, username: &str, email: &str, except: Option<i64>) -> AuthResult<()> {
        for (id, user) in &self.users {
            if Some(*id) == except {
                continue;
            }
            if user.username == username {
                return Err(AuthError::Conflict("users_username_key".to_string()));
            }
            if user.email == email {
                return Err(AuthError::Conflict("users_email_key".to_string()));
            }
        }
        Ok(())
    }
}

/// Process-local transactional store
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<MemoryTables>>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    unreachable: AtomicBool,
    reject_commits: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every begin and commit fails while set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make every commit fail while set; the staged writes are discarded
    pub fn set_reject_commits(&self, reject: bool) {
        self.faults.reject_commits.store(reject, Ordering::SeqCst);
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    fn ensure_reachable(&self) -> AuthResult<()> {
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(AuthError::Storage("memory store unreachable".to_string()));
        }
        Ok(())
    }
}

pub struct MemoryTx {
    published: OwnedMutexGuard<MemoryTables>,
    staged: MemoryTables,
}

impl Backend for MemoryDatabase {
    type Tx = MemoryTx;

    async fn begin(&self) -> AuthResult<MemoryTx> {
        self.ensure_reachable()?;
        let published = Arc::clone(&self.tables).lock_owned().await;
        let staged = published.clone();
        Ok(MemoryTx { published, staged })
    }

    async fn commit(&self, tx: MemoryTx) -> AuthResult<()> {
        self.ensure_reachable()?;
        if self.faults.reject_commits.load(Ordering::SeqCst) {
            return Err(AuthError::Storage("commit rejected".to_string()));
        }
        let MemoryTx {
            mut published,
            staged,
        } = tx;
        *published = staged;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> AuthResult<()> {
        drop(tx);
        Ok(())
    }
}

/// Test and development wiring: everything in process memory
pub enum MemoryStack {}

impl CredentialStack for MemoryStack {
    type Backend = MemoryDatabase;
    type Users = MemoryUserStore;
    type Sessions = MemorySessionStore;
    type Cache = MemoryCache;
}

// ============================================================================
// User Repository Implementation
// ============================================================================

#[derive(Clone)]
pub struct MemoryUserStore {
    executor: Executor<MemoryDatabase>,
}

impl Repository<MemoryDatabase> for MemoryUserStore {
    fn with_executor(executor: Executor<MemoryDatabase>) -> Self {
        Self { executor }
    }
}

impl UserRepository for MemoryUserStore {
    async fn create(&self, user: &NewUser) -> AuthResult<User> {
        let mut scope = self.executor.scope().await?;
        let tables = &mut scope.tx()?.staged;

        tables.ensure_unique(&user.username, &user.email, None)?;

        tables.last_user_id += 1;
        let id = tables.last_user_id;
        let now = Utc::now();
        let created = User {
            id: UserId::from_i64(id),
            username: user.username.clone(),
            email: user.email.clone(),
            password_digest: user.password_digest.clone(),
            admin: false,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, created.clone());

        scope.finish().await?;
        Ok(created)
    }

    async fn get(&self, id: UserId) -> AuthResult<Option<User>> {
        let mut scope = self.executor.scope().await?;
        let found = scope.tx()?.staged.users.get(&id.as_i64()).cloned();

        scope.finish().await?;
        Ok(found)
    }

    async fn get_by_login(&self, login: &str) -> AuthResult<Option<User>> {
        let mut scope = self.executor.scope().await?;
        let users = &scope.tx()?.staged.users;

        let found = users
            .values()
            .find(|u| u.username == login)
            .or_else(|| users.values().find(|u| u.email == login))
            .cloned();

        scope.finish().await?;
        Ok(found)
    }

    async fn save(&self, user: &User) -> AuthResult<User> {
        let mut scope = self.executor.scope().await?;
        let tables = &mut scope.tx()?.staged;

        let id = user.id.as_i64();
        if !tables.users.contains_key(&id) {
            return Err(AuthError::UserNotFound);
        }
        tables.ensure_unique(&user.username, &user.email, Some(id))?;

        let saved = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        tables.users.insert(id, saved.clone());

        scope.finish().await?;
        Ok(saved)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

#[derive(Clone)]
pub struct MemorySessionStore {
    executor: Executor<MemoryDatabase>,
}

impl Repository<MemoryDatabase> for MemorySessionStore {
    fn with_executor(executor: Executor<MemoryDatabase>) -> Self {
        Self { executor }
    }
}

impl SessionRepository for MemorySessionStore {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        let mut scope = self.executor.scope().await?;
        let tables = &mut scope.tx()?.staged;

        if tables.sessions.contains_key(&session.refresh_token) {
            return Err(AuthError::Conflict("sessions_pkey".to_string()));
        }
        if !tables.users.contains_key(&session.user_id.as_i64()) {
            return Err(AuthError::Storage(format!(
                "session references unknown user {}",
                session.user_id
            )));
        }
        tables
            .sessions
            .insert(session.refresh_token.clone(), session.clone());

        scope.finish().await
    }

    async fn get(&self, refresh_token: &str) -> AuthResult<Option<Session>> {
        let mut scope = self.executor.scope().await?;
        let found = scope.tx()?.staged.sessions.get(refresh_token).cloned();

        scope.finish().await?;
        Ok(found)
    }

    async fn delete(&self, refresh_token: &str) -> AuthResult<bool> {
        let mut scope = self.executor.scope().await?;
        let removed = scope.tx()?.staged.sessions.remove(refresh_token).is_some();

        scope.finish().await?;
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut scope = self.executor.scope().await?;
        let sessions = &mut scope.tx()?.staged.sessions;

        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        let deleted = (before - sessions.len()) as u64;

        scope.finish().await?;

        tracing::info!(sessions_deleted = deleted, "Purged expired sessions");

        Ok(deleted)
    }
}
