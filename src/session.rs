//! Session store
//!
//! Key-value persistence of per-user [`Session`]s with idle expiry. An entry
//! past its expiry is never returned, whether or not it has been purged yet.

mod memory;
mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::state_machine::Session;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Session store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for the user, if any
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>>;

    /// Store the session, expiring `ttl` from now
    async fn put(&self, user_id: &str, session: &Session, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, user_id: &str) -> StoreResult<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> StoreResult<usize>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
        (**self).get(user_id).await
    }

    async fn put(&self, user_id: &str, session: &Session, ttl: Duration) -> StoreResult<()> {
        (**self).put(user_id, session, ttl).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        (**self).delete(user_id).await
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        (**self).purge_expired().await
    }
}
