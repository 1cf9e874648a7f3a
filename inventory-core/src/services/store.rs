// src/services/store.rs
//! Local record store: named, ordered tables behind a query-builder contract.
//!
//! - Owns its `Storage` exclusively; nothing else reads or writes table keys.
//! - One cached `Vec<Record>` per table is the single in-memory instance; every
//!   mutation updates it and then persists the whole table under `<prefix><table>`.
//! - A table is loaded on first access. Nothing persisted → the table's sample rows
//!   (written out on the first mutation). Unreadable payload → logged, discarded, and
//!   replaced by the sample rows. Reads never fail.
//! - A failed storage read is not cached: reads see the sample rows for that call only,
//!   mutations fail with `QueryError::Storage`, and the next access reads storage again.
//! - Mutations are applied and persisted in call order. If persisting fails the cached
//!   table is rolled back and the caller gets `QueryError::Storage`.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::InventoryConfig;
use crate::services::query::{Filter, QueryError, QueryResult, TableRef};
use crate::services::record::{ID_FIELD, Record};
use crate::services::schema;
use crate::services::storage::{MemoryStorage, Storage, open_storage};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Namespace for storage keys: `<key_prefix><table>`.
    pub key_prefix: String,
    pub user_id: String,
    pub email: String,
    /// Erase persisted tables on sign-out (see `SessionConfig::clear_on_sign_out`).
    pub clear_on_sign_out: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&InventoryConfig::default())
    }
}

impl From<&InventoryConfig> for StoreOptions {
    fn from(cfg: &InventoryConfig) -> Self {
        Self {
            key_prefix: cfg.storage.key_prefix.clone(),
            user_id: cfg.session.user_id.clone(),
            email: cfg.session.email.clone(),
            clear_on_sign_out: cfg.session.clear_on_sign_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

pub struct RecordStore {
    storage: Box<dyn Storage>,
    options: StoreOptions,
    tables: Mutex<HashMap<String, Vec<Record>>>,
    session: Mutex<Option<SessionUser>>,
}

impl RecordStore {
    /// Wrap a backend. The session starts signed in as the configured user.
    pub fn open(storage: impl Storage + 'static, options: StoreOptions) -> Self {
        let user = SessionUser {
            id: options.user_id.clone(),
            email: options.email.clone(),
        };
        Self {
            storage: Box::new(storage),
            options,
            tables: Mutex::new(HashMap::new()),
            session: Mutex::new(Some(user)),
        }
    }

    /// Isolated, non-durable store with default options.
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new(), StoreOptions::default())
    }

    /// Backend and options from config.
    pub fn from_config(cfg: &InventoryConfig) -> Result<Self> {
        let storage = open_storage(&cfg.storage)?;
        debug!(backend = storage.kind(), "record store opened");
        Ok(Self::open(storage, StoreOptions::from(cfg)))
    }

    pub fn table<'s>(&'s self, name: &'s str) -> TableRef<'s> {
        TableRef::new(self, name)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Storage key for a table, e.g. `mock_assets`.
    pub fn storage_key(&self, table: &str) -> String {
        format!("{}{}", self.options.key_prefix, table)
    }

    /// Tables that currently have a persisted payload (prefix stripped).
    pub fn persisted_tables(&self) -> Result<Vec<String>> {
        let prefix = &self.options.key_prefix;
        Ok(self
            .storage
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect())
    }

    /// Drop the in-memory tables; the next access re-reads storage.
    pub fn reload(&self) {
        self.lock_tables().clear();
    }

    pub fn session(&self) -> Option<SessionUser> {
        self.lock_session().clone()
    }

    /// Restore the configured user's session.
    pub fn sign_in(&self) -> SessionUser {
        let user = SessionUser {
            id: self.options.user_id.clone(),
            email: self.options.email.clone(),
        };
        *self.lock_session() = Some(user.clone());
        user
    }

    /// End the session. With `clear_on_sign_out` set this ALSO erases every persisted
    /// table under this store's prefix, so the next read starts from sample rows again.
    pub fn sign_out(&self) -> QueryResult<()> {
        *self.lock_session() = None;
        if !self.options.clear_on_sign_out {
            return QueryResult::ok(());
        }

        let mut tables = self.lock_tables();
        tables.clear();
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => return QueryResult::err(QueryError::storage("*", &e)),
        };
        let mut erased = 0usize;
        for key in keys.iter().filter(|k| k.starts_with(&self.options.key_prefix)) {
            if let Err(e) = self.storage.remove(key) {
                warn!(key = %key, error = %e, "sign-out: failed to erase table");
                return QueryResult::err(QueryError::storage(key, &e));
            }
            erased += 1;
        }
        info!(erased, "signed out; persisted tables erased");
        QueryResult::ok(())
    }

    // ----------- operations (reached through the builders) -----------

    pub(crate) fn select_rows(&self, table: &str, filter: Option<&Filter>) -> QueryResult<Vec<Record>> {
        self.read_table(table, |rows| {
            let out = match filter {
                Some(f) => rows.iter().filter(|r| f.matches(r)).cloned().collect(),
                None => rows.to_vec(),
            };
            QueryResult::ok(out)
        })
    }

    pub(crate) fn select_first(&self, table: &str, filter: &Filter) -> QueryResult<Record> {
        self.read_table(table, |rows| match rows.iter().find(|r| filter.matches(r)) {
            Some(r) => QueryResult::ok(r.clone()),
            None => QueryResult::err(QueryError::not_found(table, filter)),
        })
    }

    pub(crate) fn insert_row(&self, table: &str, partial: Value) -> QueryResult<Record> {
        let mut record = match Record::try_from(partial) {
            Ok(r) => r,
            Err(other) => {
                return QueryResult::err(QueryError::malformed(
                    table,
                    format!("expected a JSON object, got {}", json_kind(&other)),
                ));
            }
        };
        let user_id = self.current_user_id();

        let supplied = match record.get(ID_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
            Some(other) => {
                return QueryResult::err(QueryError::malformed(
                    table,
                    format!("`id` must be a non-empty string, got {other}"),
                ));
            }
        };

        self.with_table(table, |rows| {
            match supplied {
                Some(id) if rows.iter().any(|r| r.id() == Some(id.as_str())) => {
                    return QueryResult::err(QueryError::malformed(
                        table,
                        format!("duplicate id {id:?}"),
                    ));
                }
                Some(_) => {}
                None => record.set(ID_FIELD, Uuid::new_v4().to_string()),
            }
            if let Some(schema) = schema::schema_for(table) {
                schema.apply_defaults(&mut record, &user_id);
            }

            rows.push(record.clone());
            if let Err(e) = self.persist(table, rows) {
                rows.pop();
                return QueryResult::err(QueryError::storage(table, &e));
            }
            debug!(table, id = record.id().unwrap_or_default(), "inserted");
            QueryResult::ok(record)
        })
    }

    pub(crate) fn update_first(&self, table: &str, filter: &Filter, patch: Value) -> QueryResult<Record> {
        let patch = match patch {
            Value::Object(m) => m,
            other => {
                return QueryResult::err(QueryError::malformed(
                    table,
                    format!("patch must be a JSON object, got {}", json_kind(&other)),
                ));
            }
        };

        self.with_table(table, |rows| {
            let Some(idx) = rows.iter().position(|r| filter.matches(r)) else {
                return QueryResult::err(QueryError::not_found(table, filter));
            };

            if let Some(new_id) = patch.get(ID_FIELD) {
                let ok = new_id.as_str().is_some_and(|id| {
                    !id.trim().is_empty()
                        && !rows
                            .iter()
                            .enumerate()
                            .any(|(i, r)| i != idx && r.id() == Some(id))
                });
                if !ok {
                    return QueryResult::err(QueryError::malformed(
                        table,
                        format!("`id` patch must be a unique non-empty string, got {new_id}"),
                    ));
                }
            }

            let previous = rows[idx].clone();
            rows[idx].merge(&patch);
            if let Err(e) = self.persist(table, rows) {
                rows[idx] = previous;
                return QueryResult::err(QueryError::storage(table, &e));
            }
            QueryResult::ok(rows[idx].clone())
        })
    }

    pub(crate) fn delete_matching(&self, table: &str, filter: &Filter) -> QueryResult<usize> {
        self.with_table(table, |rows| {
            let before = rows.len();
            let previous = rows.clone();
            rows.retain(|r| !filter.matches(r));
            let removed = before - rows.len();
            if let Err(e) = self.persist(table, rows) {
                *rows = previous;
                return QueryResult::err(QueryError::storage(table, &e));
            }
            debug!(table, removed, "deleted");
            QueryResult::ok(removed)
        })
    }

    // ----------- internals -----------

    /// Mutable access to the cached table. A failed load caches nothing.
    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Vec<Record>) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let mut tables = self.lock_tables();
        let rows = match tables.entry(table.to_string()) {
            Entry::Occupied(cached) => cached.into_mut(),
            Entry::Vacant(slot) => match self.load_table(table) {
                Ok(rows) => slot.insert(rows),
                Err(e) => {
                    warn!(table, error = %e, "storage read failed; mutation rejected");
                    return QueryResult::err(QueryError::storage(table, &e));
                }
            },
        };
        f(rows)
    }

    fn read_table<T>(&self, table: &str, f: impl FnOnce(&[Record]) -> QueryResult<T>) -> QueryResult<T> {
        let mut tables = self.lock_tables();
        if let Some(rows) = tables.get(table) {
            return f(rows);
        }
        match self.load_table(table) {
            Ok(rows) => {
                let out = f(&rows);
                tables.insert(table.to_string(), rows);
                out
            }
            Err(e) => {
                warn!(table, error = %e, "storage read failed; serving sample rows uncached");
                f(&schema::sample_rows(table, &self.options.user_id))
            }
        }
    }

    /// `Err` only when storage itself cannot be read; absent or corrupted payloads
    /// resolve to the sample rows.
    fn load_table(&self, table: &str) -> Result<Vec<Record>> {
        let key = self.storage_key(table);
        let payload = self.storage.read(&key)?;

        Ok(match payload {
            None => {
                debug!(key = %key, "nothing persisted; seeding sample rows");
                schema::sample_rows(table, &self.options.user_id)
            }
            Some(text) => match parse_table(&text) {
                Ok(rows) => rows,
                Err(reason) => {
                    warn!(key = %key, %reason, "corrupted table payload discarded; reseeding");
                    if let Err(e) = self.storage.remove(&key) {
                        warn!(key = %key, error = %e, "failed to discard corrupted payload");
                    }
                    schema::sample_rows(table, &self.options.user_id)
                }
            },
        })
    }

    fn persist(&self, table: &str, rows: &[Record]) -> Result<()> {
        let payload = serde_json::to_string(rows)?;
        self.storage.write(&self.storage_key(table), &payload)
    }

    fn current_user_id(&self) -> String {
        self.lock_session()
            .as_ref()
            .map(|u| u.id.clone())
            .unwrap_or_else(|| self.options.user_id.clone())
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<SessionUser>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A valid table payload is a JSON array of objects, each with a string `id`.
fn parse_table(text: &str) -> std::result::Result<Vec<Record>, String> {
    let rows: Vec<Record> = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if let Some(pos) = rows.iter().position(|r| r.id().is_none()) {
        return Err(format!("row {pos} has no string id"));
    }
    Ok(rows)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
