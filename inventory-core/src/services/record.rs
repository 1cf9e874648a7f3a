//! services/record.rs
//!
//! `Record` is an open field map: one entity (e.g. one asset) keyed by an `id` string.
//!
//! - Every field except `id` is optional; an absent field differs from one holding `""` or `null`.
//! - Records handed out by the store are owned copies. Editing one does nothing to the
//!   table; persistence only happens through store operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::coerce;

/// Name of the identity field carried by every stored record.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Identity, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String field, untrimmed. `None` for absent or non-string values.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Numeric field (numbers or numeric strings). `None` when absent, `null` or non-numeric.
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(coerce::value_as_number)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Strict equality predicate: the field must be present and equal to `value`.
    pub fn matches(&self, field: &str, value: &Value) -> bool {
        self.fields.get(field).is_some_and(|v| v == value)
    }

    /// Overwrite fields from `patch`; fields not in the patch are kept.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (k, v) in patch {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Object(r.fields)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// Only JSON objects are records; anything else is handed back unchanged.
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(other),
        }
    }
}
