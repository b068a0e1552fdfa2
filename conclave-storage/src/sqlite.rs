//! SQLite-backed preferences.
//!
//! One table, one row per `(namespace, key)`. Writes are single-statement
//! upserts, so each key is updated atomically.

use crate::backend::PreferenceBackend;
use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistent preference store backed by SQLite.
#[derive(Clone)]
pub struct SqlitePreferences {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePreferences {
    /// Opens (or creates) a preference database at the given path.
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opening preference database at {}", path.display());
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS preferences (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl PreferenceBackend for SqlitePreferences {
    fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO preferences (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, key, value],
        )?;
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "DELETE FROM preferences WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }
}
