// src/services/storage.rs
//! Durable key/value storage behind the record store.
//!
//! Each logical table persists as ONE serialized JSON array under a namespaced key
//! (`<prefix><table>`, e.g. `mock_assets`). Backends only move opaque strings around;
//! parsing, seeding and corruption recovery live in the store.
//!
//! - `SqliteStorage`: single-writer SQLite (WAL), one row per key.
//! - `FileStorage`  : one `<key>.json` file per key, written atomically.
//! - `MemoryStorage`: process-local map; isolated per instance (tests, dry runs).

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::{StorageBackend, StorageConfig};
use crate::utils::atomic::write_atomic;

/// Minimal durable storage contract. Implementations must be usable through `&self`.
pub trait Storage: Send {
    /// Read the payload stored under `key`; `Ok(None)` if absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the payload stored under `key`.
    fn write(&self, key: &str, payload: &str) -> Result<()>;

    /// Remove `key` (idempotent).
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored, in ascending order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Short backend label for logs.
    fn kind(&self) -> &'static str;
}

/// Open the backend selected in config.
pub fn open_storage(cfg: &StorageConfig) -> Result<Box<dyn Storage>> {
    match cfg.backend {
        StorageBackend::Sqlite => Ok(Box::new(SqliteStorage::open(&cfg.sqlite_path)?)),
        StorageBackend::File => Ok(Box::new(FileStorage::open(&cfg.files_dir)?)),
        StorageBackend::Memory => Ok(Box::new(MemoryStorage::new())),
    }
}

// ---------- SQLite ----------

/// SQLite-backed storage. Owns a single connection; the store is the only writer.
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open/create the database and ensure the `kv` table.
    ///
    /// Creates the parent directory if missing and enables WAL.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all({:?})", parent))?;
        }

        let db = Connection::open(db_path)
            .with_context(|| format!("open sqlite {}", db_path.display()))?;

        db.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS kv (
              key         TEXT PRIMARY KEY,  -- namespaced table key, e.g. "mock_assets"
              value       TEXT NOT NULL,     -- JSON array of records
              updated_at  TEXT NOT NULL      -- RFC3339 UTC
            );
            "#,
        )?;

        Ok(Self { db })
    }
}

impl Storage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let v = self
            .db
            .query_row("SELECT value FROM kv WHERE key=?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(v)
    }

    fn write(&self, key: &str, payload: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.execute(
            r#"
            INSERT INTO kv(key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
              value      = excluded.value,
              updated_at = excluded.updated_at
            "#,
            (key, payload, &now),
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.execute("DELETE FROM kv WHERE key=?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.db.prepare("SELECT key FROM kv ORDER BY key")?;
        let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(iter.filter_map(|r| r.ok()).collect())
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

// ---------- Files ----------

/// Directory of `<key>.json` files. Root is typically `<root>/tables`.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open or initialize the directory (idempotent).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("create_dir_all({:?})", root))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.json", sanitize_key(key)?)))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {:?}", path))?;
        Ok(Some(text))
    }

    fn write(&self, key: &str, payload: &str) -> Result<()> {
        write_atomic(&self.path_for(key)?, payload.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {:?}", path)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

/// Keys become file names: only `[A-Za-z0-9_.-]`, no leading dot.
fn sanitize_key(key: &str) -> Result<String> {
    let k = key.trim();
    if k.is_empty() {
        anyhow::bail!("empty storage key");
    }
    if k.starts_with('.') {
        anyhow::bail!("storage key may not start with '.': {k:?}");
    }
    if !k
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        anyhow::bail!("storage key has unsupported characters: {k:?}");
    }
    Ok(k.to_string())
}

// ---------- In-memory ----------

#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map().get(key).cloned())
    }

    fn write(&self, key: &str, payload: &str) -> Result<()> {
        self.map().insert(key.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.map().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.map().keys().cloned().collect())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }
    fn write(&self, key: &str, payload: &str) -> Result<()> {
        (**self).write(key, payload)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

/// Shared handle, so two stores (or a store and a test) can observe the same backend.
impl<S: Storage + Sync + ?Sized> Storage for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }
    fn write(&self, key: &str, payload: &str) -> Result<()> {
        (**self).write(key, payload)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}
