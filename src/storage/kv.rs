//! Small string key-value store for UI state that outlives the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

pub trait KvStore {
    fn get(&self, key: &str) -> crate::error::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> crate::error::Result<()>;
}

/// SQLite-backed store at `<data dir>/nf-preview/state.sqlite`.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_db_path()?;
        Self::open(&db_path)
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "nf-preview")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.data_dir().join("state.sqlite"))
    }

    /// Opens or creates the database, with WAL journaling.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
            ",
        )
        .context("Failed to initialize key-value schema")?;

        info!("Opened state store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> crate::error::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// In-process store, used when the database is unavailable.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> crate::error::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> crate::error::Result<()> {
        (**self).set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sub").join("state.sqlite");
        let _store = SqliteKv::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_set_overwrites_and_persists() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("state.sqlite");
        {
            let store = SqliteKv::open(&db_path).unwrap();
            assert_eq!(store.get("k").unwrap(), None);
            store.set("k", "1").unwrap();
            store.set("k", "2").unwrap();
        }
        let reopened = SqliteKv::open(&db_path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryKv::default();
        store.set("a", "x").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("x"));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
