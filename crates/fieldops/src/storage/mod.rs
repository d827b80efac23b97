//! Key/value persistence providers.
//!
//! The local store keeps each collection as one serialized JSON string under a
//! single key. This module defines the provider contract and its two
//! backends: `SqliteKv` for on-disk persistence and `MemoryKv` for tests and
//! dry runs.

pub mod migrations;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A raw string key/value persistence provider.
///
/// Values are opaque strings; the local store puts serialized JSON arrays in
/// them. Implementations are last-write-wins and make no cross-key
/// transactional promises.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every key.
    async fn clear(&self) -> Result<()>;

    /// List stored keys in lexical order.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// `SQLite`-backed key/value provider.
#[derive(Debug)]
pub struct SqliteKv {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection. Never held across an await point.
    conn: Mutex<Connection>,
}

impl SqliteKv {
    /// Open or create a key/value database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StoreLock)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value],
        )?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM kv_store", [])?;
        info!("Cleared {} stored keys", removed);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// In-process key/value provider.
///
/// Counts writes so callers can assert that read-only paths never persist.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<u64>,
}

impl MemoryKv {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set`, `remove` and `clear` calls seen so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.lock().map_or(0, |writes| *writes)
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|_| Error::StoreLock)
    }

    fn record_write(&self) -> Result<()> {
        let mut writes = self.writes.lock().map_err(|_| Error::StoreLock)?;
        *writes += 1;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        self.record_write()
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        self.record_write()
    }

    async fn clear(&self) -> Result<()> {
        self.entries()?.clear();
        self.record_write()
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fieldops_{tag}_{}.db", std::process::id()))
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    async fn exercise_provider(kv: &dyn KeyValueStore) {
        assert!(kv.get("missing").await.unwrap().is_none());

        kv.set("b", "[1]").await.unwrap();
        kv.set("a", "[]").await.unwrap();
        assert_eq!(kv.get("b").await.unwrap().as_deref(), Some("[1]"));

        kv.set("b", "[1,2]").await.unwrap();
        assert_eq!(kv.get("b").await.unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(kv.keys().await.unwrap(), vec!["a", "b"]);

        kv.remove("a").await.unwrap();
        kv.remove("a").await.unwrap();
        assert!(kv.get("a").await.unwrap().is_none());

        kv.clear().await.unwrap();
        assert!(kv.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_kv_contract() {
        exercise_provider(&MemoryKv::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_kv_contract() {
        exercise_provider(&SqliteKv::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_memory_kv_counts_writes() {
        let kv = MemoryKv::new();
        assert_eq!(kv.write_count(), 0);

        kv.get("x").await.unwrap();
        assert_eq!(kv.write_count(), 0);

        kv.set("x", "1").await.unwrap();
        kv.remove("x").await.unwrap();
        assert_eq!(kv.write_count(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_kv_persists_across_reopen() {
        let path = temp_db_path("reopen");
        cleanup(&path);

        {
            let kv = SqliteKv::open(&path).unwrap();
            assert_eq!(kv.path(), path);
            kv.set("@fieldops:doctors", r#"[{"id":"d1"}]"#).await.unwrap();
        }

        let kv = SqliteKv::open(&path).unwrap();
        assert_eq!(
            kv.get("@fieldops:doctors").await.unwrap().as_deref(),
            Some(r#"[{"id":"d1"}]"#)
        );

        drop(kv);
        cleanup(&path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("fieldops_nested_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let nested = root.join("a/b/store.db");

        let kv = SqliteKv::open(&nested).unwrap();
        assert!(nested.exists());

        drop(kv);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_in_memory_path() {
        let kv = SqliteKv::open_in_memory().unwrap();
        assert_eq!(kv.path().to_string_lossy(), ":memory:");
    }
}
