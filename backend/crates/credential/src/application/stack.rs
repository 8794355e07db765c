//! Store wiring
//!
//! A [`CredentialStack`] names one consistent set of store types so the
//! services can be written once and run against Postgres or memory.

use crate::domain::repository::{CacheStore, SessionRepository, UserRepository};
use crate::infra::transaction::{Backend, Repository};

pub trait CredentialStack: Send + Sync + 'static {
    type Backend: Backend;
    type Users: UserRepository + Repository<Self::Backend> + Send + Sync + 'static;
    type Sessions: SessionRepository + Repository<Self::Backend> + Send + Sync + 'static;
    type Cache: CacheStore + Clone + Send + Sync + 'static;
}
