//! SQLite-backed session store
//!
//! One row per user: the JSON-encoded session and its expiry in Unix
//! milliseconds, so expiry checks run inside SQLite against the index.

use super::{SessionStore, StoreError, StoreResult};
use crate::state_machine::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    user_id TEXT PRIMARY KEY,
    session TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
";

/// Thread-safe database handle
#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}


#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<Session>> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp_millis();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT session, expires_at FROM sessions WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((json, expires_at)) if expires_at > now => Ok(Some(serde_json::from_str(&json)?)),
            Some(_) => {
                conn.execute(
                    "DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= ?2",
                    params![user_id, now],
                )?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, user_id: &str, session: &Session, ttl: Duration) -> StoreResult<()> {
        let json = serde_json::to_string(session)?;
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (user_id, session, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                session = excluded.session,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![
                user_id,
                json,
                expiry_from(now, ttl).timestamp_millis(),
                now.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        self.conn()?
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let purged = self.conn()?.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(purged)
    }
}
