//! services/schema.rs
//!
//! Schema-by-convention for known tables: which defaults `insert` fills in and which
//! sample rows a table starts with when nothing has been persisted yet.
//!
//! Nothing here is enforced on reads; callers may store any fields they like.

use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::services::record::Record;

/// Value source for a defaulted field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Literal(Value),
    /// RFC 3339 UTC timestamp at insert time.
    Now,
    /// Id of the session user (or the configured demo user once signed out).
    SessionUser,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub defaults: Vec<(&'static str, FieldDefault)>,
}

impl TableSchema {
    /// Fill every documented default that `record` does not already carry.
    /// Present fields (including `null` and `""`) are left untouched.
    pub fn apply_defaults(&self, record: &mut Record, user_id: &str) {
        for (field, default) in &self.defaults {
            if record.contains(field) {
                continue;
            }
            let v = match default {
                FieldDefault::Literal(v) => v.clone(),
                FieldDefault::Now => Value::String(Utc::now().to_rfc3339()),
                FieldDefault::SessionUser => Value::String(user_id.to_string()),
            };
            record.set(*field, v);
        }
    }
}

pub const ASSETS: &str = "assets";
pub const CHECKOUTS: &str = "checkouts";
pub const LOCATIONS: &str = "locations";

static SCHEMAS: Lazy<Vec<TableSchema>> = Lazy::new(|| {
    use FieldDefault::*;
    let unknown = || Literal(json!("Unknown"));
    vec![
        TableSchema {
            name: ASSETS,
            defaults: vec![
                ("created_at", Now),
                ("user_id", SessionUser),
                ("asset_name", unknown()),
                ("manufacturer", unknown()),
                ("model_number", unknown()),
                ("category", Literal(json!("Other"))),
                ("status", Literal(json!("in_use"))),
                ("condition", Literal(json!("good"))),
                ("purchase_cost", Literal(Value::Null)),
                ("current_value", Literal(Value::Null)),
            ],
        },
        TableSchema {
            name: CHECKOUTS,
            defaults: vec![
                ("created_at", Now),
                ("user_id", SessionUser),
                ("status", Literal(json!("checked_out"))),
            ],
        },
        TableSchema {
            name: LOCATIONS,
            defaults: vec![("created_at", Now)],
        },
    ]
});

/// Documented schema for `table`, if any.
pub fn schema_for(table: &str) -> Option<&'static TableSchema> {
    SCHEMAS.iter().find(|s| s.name == table)
}

/// Rows a table starts with when storage holds nothing for it.
pub fn sample_rows(table: &str, user_id: &str) -> Vec<Record> {
    match table {
        ASSETS => sample_assets(user_id),
        _ => Vec::new(),
    }
}

fn sample_assets(user_id: &str) -> Vec<Record> {
    let rows = [
        json!({
            "id": "1",
            "user_id": user_id,
            "category": "Electronics",
            "status": "in_use",
            "condition": "excellent",
            "asset_name": "MacBook Pro 16\"",
            "manufacturer": "Apple",
            "model_number": "A2485",
            "purchase_cost": 18000,
            "current_value": 15000,
            "created_at": "2024-01-15T00:00:00Z"
        }),
        json!({
            "id": "2",
            "user_id": user_id,
            "category": "Furniture",
            "status": "in_use",
            "condition": "good",
            "asset_name": "Herman Miller Chair",
            "manufacturer": "Herman Miller",
            "model_number": "Aeron",
            "purchase_cost": 1200,
            "current_value": 800,
            "created_at": "2024-02-20T00:00:00Z"
        }),
        json!({
            "id": "3",
            "user_id": user_id,
            "category": "Electronics",
            "status": "in_use",
            "condition": "excellent",
            "asset_name": "iPhone 15 Pro",
            "manufacturer": "Apple",
            "model_number": "A3108",
            "purchase_cost": 5500,
            "current_value": 5000,
            "created_at": "2024-03-10T00:00:00Z"
        }),
    ];
    rows.into_iter()
        .filter_map(|v| Record::try_from(v).ok())
        .collect()
}
