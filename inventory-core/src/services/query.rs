//! services/query.rs
//!
//! Query-builder surface over a [`RecordStore`] table.
//!
//! Supported chains (and only these):
//! - `store.table(t).select()`                          → `QueryResult<Vec<Record>>`
//! - `store.table(t).select().filter(f, v)`             → `QueryResult<Vec<Record>>`
//! - `store.table(t).select().filter(f, v).one()`       → `QueryResult<Record>`
//! - `store.table(t).insert(partial)`                   → `QueryResult<Record>`
//! - `store.table(t).update(f, v, patch)`               → `QueryResult<Record>`
//! - `store.table(t).delete(f, v)`                      → `QueryResult<usize>`
//!
//! Every terminal builder runs with `.execute()` or `.await`. Awaiting resolves
//! immediately; it only exists so call sites read the same as they would against a
//! networked backend.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::future::{IntoFuture, Ready, ready};
use thiserror::Error;

use crate::services::record::Record;
use crate::services::store::RecordStore;

/// Caller-facing failure carried in a [`QueryResult`]. Never raised as a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryError {
    #[error("no record in `{table}` where {field} = {value}")]
    NotFound {
        table: String,
        field: String,
        value: String,
    },

    #[error("malformed record for `{table}`: {reason}")]
    MalformedRecord { table: String, reason: String },

    #[error("storage failure for `{table}`: {reason}")]
    Storage { table: String, reason: String },
}

impl QueryError {
    pub fn not_found(table: &str, filter: &Filter) -> Self {
        Self::NotFound {
            table: table.to_string(),
            field: filter.field.clone(),
            value: filter.value.to_string(),
        }
    }

    pub fn malformed(table: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn storage(table: &str, err: &anyhow::Error) -> Self {
        Self::Storage {
            table: table.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// `{ data, error }`; exactly one side is populated.
///
/// Serializes as `{"data": <T>, "error": null}` or `{"data": null, "error": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T>(Result<T, QueryError>);

impl<T> QueryResult<T> {
    pub fn ok(data: T) -> Self {
        Self(Ok(data))
    }

    pub fn err(error: QueryError) -> Self {
        Self(Err(error))
    }

    pub fn data(&self) -> Option<&T> {
        self.0.as_ref().ok()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.0.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.0.is_ok()
    }

    pub fn into_data(self) -> Option<T> {
        self.0.ok()
    }

    pub fn into_result(self) -> Result<T, QueryError> {
        self.0
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        QueryResult(self.0.map(f))
    }
}

impl<T> From<Result<T, QueryError>> for QueryResult<T> {
    fn from(r: Result<T, QueryError>) -> Self {
        Self(r)
    }
}

impl<T: Serialize> Serialize for QueryResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("QueryResult", 2)?;
        match &self.0 {
            Ok(data) => {
                st.serialize_field("data", data)?;
                st.serialize_field("error", &Option::<QueryError>::None)?;
            }
            Err(e) => {
                st.serialize_field("data", &Option::<()>::None)?;
                st.serialize_field("error", e)?;
            }
        }
        st.end()
    }
}

/// Single-field equality predicate. Absent fields never match.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.matches(&self.field, &self.value)
    }
}

// ----------- builders -----------

/// Handle on one named table. Tables exist implicitly; no call here touches storage.
#[derive(Clone, Copy)]
pub struct TableRef<'s> {
    store: &'s RecordStore,
    table: &'s str,
}

impl<'s> TableRef<'s> {
    pub(crate) fn new(store: &'s RecordStore, table: &'s str) -> Self {
        Self { store, table }
    }

    pub fn name(&self) -> &str {
        self.table
    }

    pub fn select(&self) -> SelectQuery<'s> {
        SelectQuery {
            store: self.store,
            table: self.table,
        }
    }

    pub fn insert(&self, partial: impl Into<Value>) -> InsertQuery<'s> {
        InsertQuery {
            store: self.store,
            table: self.table,
            partial: partial.into(),
        }
    }

    pub fn update(
        &self,
        field: impl Into<String>,
        value: impl Into<Value>,
        patch: impl Into<Value>,
    ) -> UpdateQuery<'s> {
        UpdateQuery {
            store: self.store,
            table: self.table,
            filter: Filter::eq(field, value),
            patch: patch.into(),
        }
    }

    pub fn delete(&self, field: impl Into<String>, value: impl Into<Value>) -> DeleteQuery<'s> {
        DeleteQuery {
            store: self.store,
            table: self.table,
            filter: Filter::eq(field, value),
        }
    }
}

/// Unfiltered read; insertion order.
#[must_use = "queries do nothing until executed or awaited"]
pub struct SelectQuery<'s> {
    store: &'s RecordStore,
    table: &'s str,
}

impl<'s> SelectQuery<'s> {
    pub fn filter(self, field: impl Into<String>, value: impl Into<Value>) -> FilteredSelect<'s> {
        FilteredSelect {
            store: self.store,
            table: self.table,
            filter: Filter::eq(field, value),
        }
    }

    pub fn execute(self) -> QueryResult<Vec<Record>> {
        self.store.select_rows(self.table, None)
    }
}

#[must_use = "queries do nothing until executed or awaited"]
pub struct FilteredSelect<'s> {
    store: &'s RecordStore,
    table: &'s str,
    filter: Filter,
}

impl<'s> FilteredSelect<'s> {
    /// First match as a single record; `NotFound` when nothing matches.
    pub fn one(self) -> SelectOne<'s> {
        SelectOne {
            store: self.store,
            table: self.table,
            filter: self.filter,
        }
    }

    pub fn execute(self) -> QueryResult<Vec<Record>> {
        self.store.select_rows(self.table, Some(&self.filter))
    }
}

#[must_use = "queries do nothing until executed or awaited"]
pub struct SelectOne<'s> {
    store: &'s RecordStore,
    table: &'s str,
    filter: Filter,
}

impl SelectOne<'_> {
    pub fn execute(self) -> QueryResult<Record> {
        self.store.select_first(self.table, &self.filter)
    }
}

#[must_use = "queries do nothing until executed or awaited"]
pub struct InsertQuery<'s> {
    store: &'s RecordStore,
    table: &'s str,
    partial: Value,
}

impl InsertQuery<'_> {
    pub fn execute(self) -> QueryResult<Record> {
        self.store.insert_row(self.table, self.partial)
    }
}

#[must_use = "queries do nothing until executed or awaited"]
pub struct UpdateQuery<'s> {
    store: &'s RecordStore,
    table: &'s str,
    filter: Filter,
    patch: Value,
}

impl UpdateQuery<'_> {
    pub fn execute(self) -> QueryResult<Record> {
        self.store.update_first(self.table, &self.filter, self.patch)
    }
}

#[must_use = "queries do nothing until executed or awaited"]
pub struct DeleteQuery<'s> {
    store: &'s RecordStore,
    table: &'s str,
    filter: Filter,
}

impl DeleteQuery<'_> {
    /// Data is the number of records removed (zero is still success).
    pub fn execute(self) -> QueryResult<usize> {
        self.store.delete_matching(self.table, &self.filter)
    }
}

macro_rules! resolve_on_await {
    ($($builder:ident => $out:ty),* $(,)?) => {
        $(
            impl<'s> IntoFuture for $builder<'s> {
                type Output = QueryResult<$out>;
                type IntoFuture = Ready<QueryResult<$out>>;

                fn into_future(self) -> Self::IntoFuture {
                    ready(self.execute())
                }
            }
        )*
    };
}

resolve_on_await! {
    SelectQuery => Vec<Record>,
    FilteredSelect => Vec<Record>,
    SelectOne => Record,
    InsertQuery => Record,
    UpdateQuery => Record,
    DeleteQuery => usize,
}
