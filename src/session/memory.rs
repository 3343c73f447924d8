//! In-process session store

use super::{SessionStore, StoreError, StoreResult};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// Sessions held in a map, lost on restart
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
        let mut entries = self.entries()?;
        let expired = match entries.get(user_id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.session.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(user_id);
        }
        Ok(None)
    }

    async fn put(&self, user_id: &str, session: &Session, ttl: Duration) -> StoreResult<()> {
        self.entries()?.insert(
            user_id.to_string(),
            Entry {
                session: session.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        self.entries()?.remove(user_id);
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}
