//! Key/value persistence backends

use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::DbPool;
use crate::{Error, Result};

/// Durable string key/value storage
///
/// Values are always written whole; there is no partial update.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`; absent keys are not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written
    fn remove(&self, key: &str) -> Result<()>;
}

/// `SQLite`-backed store
pub struct SqliteKvStore {
    db: DbPool,
}

impl SqliteKvStore {
    /// Create a new store backed by the given pool
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "DELETE FROM kv_entries WHERE key = ?1",
            rusqlite::params![key],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}

/// Process-local store, used in tests and when no data directory exists
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| Error::Database(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
