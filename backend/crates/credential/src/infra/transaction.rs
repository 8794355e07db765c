//! Unit of Work
//!
//! Every repository runs through an [`Executor`], which is either
//!
//! - **standalone**: each call opens its own transaction, commits on success
//!   and rolls back on error, invisibly to the caller; or
//! - **joined**: calls share one [`WorkHandle`] obtained from
//!   [`TransactionCoordinator::begin`]. Joined calls never commit; whoever
//!   began the work commits or rolls back exactly once.
//!
//! Rollback on drop is the scoped guard: an unfinished transaction that goes
//! out of scope (early `?` return, panic, cancelled future) is discarded.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AuthError, AuthResult};

/// Transactional store
///
/// Implementations must discard the writes of a `Tx` that is dropped
/// without being committed.
pub trait Backend: Clone + Send + Sync + 'static {
    type Tx: Send + 'static;

    fn begin(&self) -> impl Future<Output = AuthResult<Self::Tx>> + Send;

    fn commit(&self, tx: Self::Tx) -> impl Future<Output = AuthResult<()>> + Send;

    fn rollback(&self, tx: Self::Tx) -> impl Future<Output = AuthResult<()>> + Send;
}

/// Hands out units of work for one backend
#[derive(Clone)]
pub struct TransactionCoordinator<B: Backend> {
    backend: B,
}

impl<B: Backend> TransactionCoordinator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Open an ambient transaction
    pub async fn begin(&self) -> AuthResult<WorkHandle<B>> {
        let tx = self.backend.begin().await?;
        Ok(WorkHandle {
            backend: self.backend.clone(),
            slot: Arc::new(Mutex::new(Some(tx))),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Shared handle to one open transaction
///
/// Clones refer to the same transaction. Once committed or rolled back, the
/// slot is empty and every further use fails with `AuthError::Storage`.
pub struct WorkHandle<B: Backend> {
    backend: B,
    slot: Arc<Mutex<Option<B::Tx>>>,
}

impl<B: Backend> Clone for WorkHandle<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<B: Backend> WorkHandle<B> {
    pub async fn commit(self) -> AuthResult<()> {
        let tx = self.take().await?;
        self.backend.commit(tx).await
    }

    pub async fn rollback(self) -> AuthResult<()> {
        let tx = self.take().await?;
        self.backend.rollback(tx).await
    }

    /// Commit on `Ok`, roll back on `Err`
    ///
    /// A rollback failure is only logged; the caller gets back the error it
    /// passed in.
    pub async fn finish<T: Send>(self, result: AuthResult<T>) -> AuthResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        cause = %err,
                        "Rollback of failed unit of work failed"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    async fn take(&self) -> AuthResult<B::Tx> {
        self.slot.lock().await.take().ok_or_else(finished_error)
    }
}

fn finished_error() -> AuthError {
    AuthError::Storage("unit of work already finished".to_string())
}

/// Execution mode a repository is bound to
pub enum Executor<B: Backend> {
    Standalone(B),
    Joined(WorkHandle<B>),
}

impl<B: Backend> Clone for Executor<B> {
    fn clone(&self) -> Self {
        match self {
            Executor::Standalone(backend) => Executor::Standalone(backend.clone()),
            Executor::Joined(work) => Executor::Joined(work.clone()),
        }
    }
}

impl<B: Backend> Executor<B> {
    /// Acquire a transaction for one repository call
    ///
    /// Standalone mode begins a fresh transaction; joined mode locks the
    /// shared one for the duration of the call.
    pub async fn scope(&self) -> AuthResult<Scope<'_, B>> {
        let inner = match self {
            Executor::Standalone(backend) => ScopeInner::Owned {
                backend,
                tx: backend.begin().await?,
            },
            Executor::Joined(work) => ScopeInner::Joined(work.slot.lock().await),
        };
        Ok(Scope { inner })
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Executor::Joined(_))
    }
}

/// Transaction access for the duration of one repository call
pub struct Scope<'a, B: Backend> {
    inner: ScopeInner<'a, B>,
}

enum ScopeInner<'a, B: Backend> {
    Owned { backend: &'a B, tx: B::Tx },
    Joined(MutexGuard<'a, Option<B::Tx>>),
}

impl<B: Backend> Scope<'_, B> {
    pub fn tx(&mut self) -> AuthResult<&mut B::Tx> {
        match &mut self.inner {
            ScopeInner::Owned { tx, .. } => Ok(tx),
            ScopeInner::Joined(guard) => guard.as_mut().ok_or_else(finished_error),
        }
    }

    /// End the call successfully: commits a standalone transaction,
    /// releases a joined one untouched
    pub async fn finish(self) -> AuthResult<()> {
        match self.inner {
            ScopeInner::Owned { backend, tx } => backend.commit(tx).await,
            ScopeInner::Joined(_) => Ok(()),
        }
    }
}

/// Constructors shared by every store
///
/// A store is bound to its mode at construction and keeps it for life.
pub trait Repository<B: Backend>: Sized {
    fn with_executor(executor: Executor<B>) -> Self;

    /// Each call runs in its own transaction
    fn standalone(backend: B) -> Self {
        Self::with_executor(Executor::Standalone(backend))
    }

    /// Calls run inside `work`; nothing commits until the owner of `work` does
    fn joined(work: &WorkHandle<B>) -> Self {
        Self::with_executor(Executor::Joined(work.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Backend that records every transaction event
    #[derive(Clone, Default)]
    struct RecordingBackend {
        log: Arc<StdMutex<Vec<String>>>,
        fail_begin: bool,
    }

    struct RecordingTx {
        id: usize,
        log: Arc<StdMutex<Vec<String>>>,
        finished: bool,
    }

    impl Drop for RecordingTx {
        fn drop(&mut self) {
            if !self.finished {
                self.log.lock().unwrap().push(format!("drop {}", self.id));
            }
        }
    }

    impl RecordingBackend {
        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Backend for RecordingBackend {
        type Tx = RecordingTx;

        async fn begin(&self) -> AuthResult<RecordingTx> {
            if self.fail_begin {
                return Err(AuthError::Storage("begin refused".into()));
            }
            let mut log = self.log.lock().unwrap();
            let id = log.iter().filter(|e| e.starts_with("begin")).count();
            log.push(format!("begin {id}"));
            Ok(RecordingTx {
                id,
                log: Arc::clone(&self.log),
                finished: false,
            })
        }

        async fn commit(&self, mut tx: RecordingTx) -> AuthResult<()> {
            tx.finished = true;
            self.log.lock().unwrap().push(format!("commit {}", tx.id));
            Ok(())
        }

        async fn rollback(&self, mut tx: RecordingTx) -> AuthResult<()> {
            tx.finished = true;
            self.log.lock().unwrap().push(format!("rollback {}", tx.id));
            Ok(())
        }
    }

    struct Probe {
        executor: Executor<RecordingBackend>,
    }

    impl Repository<RecordingBackend> for Probe {
        fn with_executor(executor: Executor<RecordingBackend>) -> Self {
            Self { executor }
        }
    }

    impl Probe {
        async fn touch(&self, fail: bool) -> AuthResult<()> {
            let mut scope = self.executor.scope().await?;
            scope.tx()?;
            if fail {
                return Err(AuthError::Internal("probe failed".into()));
            }
            scope.finish().await
        }
    }

    #[tokio::test]
    async fn test_standalone_commits_each_call() {
        let backend = RecordingBackend::default();
        let probe = Probe::standalone(backend.clone());

        probe.touch(false).await.unwrap();
        probe.touch(false).await.unwrap();

        assert_eq!(
            backend.events(),
            vec!["begin 0", "commit 0", "begin 1", "commit 1"]
        );
    }

    #[tokio::test]
    async fn test_standalone_error_rolls_back() {
        let backend = RecordingBackend::default();
        let probe = Probe::standalone(backend.clone());

        assert!(probe.touch(true).await.is_err());
        assert_eq!(backend.events(), vec!["begin 0", "drop 0"]);
    }

    #[tokio::test]
    async fn test_joined_calls_never_commit() {
        let backend = RecordingBackend::default();
        let coordinator = TransactionCoordinator::new(backend.clone());
        let work = coordinator.begin().await.unwrap();

        let a = Probe::joined(&work);
        let b = Probe::joined(&work);
        a.touch(false).await.unwrap();
        b.touch(false).await.unwrap();
        assert_eq!(backend.events(), vec!["begin 0"]);

        work.commit().await.unwrap();
        assert_eq!(backend.events(), vec!["begin 0", "commit 0"]);
    }

    #[tokio::test]
    async fn test_finished_work_rejects_further_use() {
        let backend = RecordingBackend::default();
        let coordinator = TransactionCoordinator::new(backend);
        let work = coordinator.begin().await.unwrap();
        let probe = Probe::joined(&work);
        let second = work.clone();

        work.commit().await.unwrap();

        assert!(!second.is_open().await);
        assert!(matches!(probe.touch(false).await, Err(AuthError::Storage(_))));
        assert!(matches!(second.commit().await, Err(AuthError::Storage(_))));
    }

    #[tokio::test]
    async fn test_finish_routes_result() {
        let backend = RecordingBackend::default();
        let coordinator = TransactionCoordinator::new(backend.clone());

        let work = coordinator.begin().await.unwrap();
        assert_eq!(work.finish(Ok(7)).await.unwrap(), 7);

        let work = coordinator.begin().await.unwrap();
        let err = work
            .finish::<()>(Err(AuthError::InvalidToken))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        assert_eq!(
            backend.events(),
            vec!["begin 0", "commit 0", "begin 1", "rollback 1"]
        );
    }

    #[tokio::test]
    async fn test_dropped_work_rolls_back() {
        let backend = RecordingBackend::default();
        let coordinator = TransactionCoordinator::new(backend.clone());

        {
            let work = coordinator.begin().await.unwrap();
            let probe = Probe::joined(&work);
            probe.touch(false).await.unwrap();
        }

        assert_eq!(backend.events(), vec!["begin 0", "drop 0"]);
    }

    #[tokio::test]
    async fn test_begin_failure_surfaces_unchanged() {
        let backend = RecordingBackend {
            fail_begin: true,
            ..Default::default()
        };
        let coordinator = TransactionCoordinator::new(backend.clone());

        assert!(matches!(
            coordinator.begin().await,
            Err(AuthError::Storage(msg)) if msg == "begin refused"
        ));
        assert!(matches!(
            Probe::standalone(backend).touch(false).await,
            Err(AuthError::Storage(_))
        ));
    }
}
