//! services/history.rs
//!
//! Asset change history: who held an asset, and when it moved.
//!
//! Raw change rows come from a CRM field-history export, either as JSON objects
//! (`Id`, `Asset.Name`, `Asset.Name__c`, `CreatedDate`, `Field`, `OldValue`, `NewValue`)
//! or as CSV with the same header. Rows whose old or new value is a raw user-id reference
//! (`00…`) are duplicates of a name change and are dropped. Blank values render as `—`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::services::ingestor::{FieldSpec, IngestMapping, Ingestor, QUOTE, SEPARATOR};
use crate::services::record::Record;

/// Shown in place of a blank old/new value.
pub const EMPTY_VALUE: &str = "—";

/// Prefix of raw user-id references in old/new values.
pub const USER_REF_PREFIX: &str = "00";

pub const CSV_HEADER: [&str; 6] = ["Date", "Time", "Asset Name", "Asset Code", "From", "To"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub asset_name: String,
    pub asset_code: String,
    pub created_date: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// One row of the JSON export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHistoryRow {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Asset.Name", default)]
    pub asset_name: String,
    #[serde(rename = "Asset.Name__c", default)]
    pub asset_code: String,
    #[serde(rename = "CreatedDate", default)]
    pub created_date: String,
    #[serde(rename = "Field", default)]
    pub field: String,
    #[serde(rename = "OldValue", default)]
    pub old_value: Option<String>,
    #[serde(rename = "NewValue", default)]
    pub new_value: Option<String>,
}

impl RawHistoryRow {
    fn into_entry(self) -> Option<HistoryEntry> {
        let old = self.old_value.unwrap_or_default();
        let new = self.new_value.unwrap_or_default();
        if old.starts_with(USER_REF_PREFIX) || new.starts_with(USER_REF_PREFIX) {
            return None;
        }
        Some(HistoryEntry {
            id: self.id,
            asset_name: self.asset_name,
            asset_code: self.asset_code,
            created_date: self.created_date,
            field: self.field,
            old_value: or_empty_marker(old),
            new_value: or_empty_marker(new),
        })
    }
}

pub fn parse_history(rows: impl IntoIterator<Item = RawHistoryRow>) -> Vec<HistoryEntry> {
    rows.into_iter().filter_map(RawHistoryRow::into_entry).collect()
}

/// Column mapping for the CSV form of the export.
pub fn history_mapping() -> IngestMapping {
    use FieldSpec as F;
    IngestMapping::new(
        "Id",
        vec![
            F::text("Asset.Name", "asset_name"),
            F::text("Asset.Name__c", "asset_code"),
            F::text("CreatedDate", "created_date"),
            F::text("Field", "field"),
            F::text("OldValue", "old_value"),
            F::text("NewValue", "new_value"),
        ],
    )
}

/// Parse the CSV export. Rows without an `Id` are dropped by the ingestor.
pub fn history_from_csv(text: &str) -> Vec<HistoryEntry> {
    let report = Ingestor::new(history_mapping()).ingest(text);
    parse_history(report.records.iter().map(raw_from_record))
}

fn raw_from_record(r: &Record) -> RawHistoryRow {
    let text = |f: &str| r.get_str(f).unwrap_or_default().to_string();
    RawHistoryRow {
        id: text("id"),
        asset_name: text("asset_name"),
        asset_code: text("asset_code"),
        created_date: text("created_date"),
        field: text("field"),
        old_value: Some(text("old_value")),
        new_value: Some(text("new_value")),
    }
}

fn or_empty_marker(v: String) -> String {
    if v.is_empty() { EMPTY_VALUE.to_string() } else { v }
}

/// Distinct non-blank asset names, sorted.
pub fn unique_assets(entries: &[HistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.asset_name.clone())
        .filter(|n| !n.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct holders appearing on either side of a change, sorted; `—` excluded.
pub fn unique_users(entries: &[HistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| [&e.old_value, &e.new_value])
        .filter(|v| v.as_str() != EMPTY_VALUE)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// CSV export: `Date,Time,Asset Name,Asset Code,From,To`, newline-separated, no trailing newline.
pub fn to_csv(entries: &[HistoryEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for e in entries {
        let (date, time) = split_timestamp(&e.created_date);
        let cells = [
            csv_cell(&date, false),
            csv_cell(&time, false),
            csv_cell(&e.asset_name, true),
            csv_cell(&e.asset_code, false),
            csv_cell(&e.old_value, true),
            csv_cell(&e.new_value, true),
        ];
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

/// `("17 Jul 2025", "07:49")` in UTC; unparseable input → `(raw, "")`.
pub fn split_timestamp(raw: &str) -> (String, String) {
    match parse_timestamp(raw) {
        Some(ts) => {
            let utc = ts.naive_utc();
            (
                utc.format("%d %b %Y").to_string(),
                utc.format("%H:%M").to_string(),
            )
        }
        None => (raw.to_string(), String::new()),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

/// Quote with doubled-quote escaping; unforced cells are quoted only when they need it.
fn csv_cell(value: &str, force: bool) -> String {
    let needs = value.contains(SEPARATOR) || value.contains(QUOTE) || value.contains('\n');
    if force || needs {
        let escaped = value.replace(QUOTE, "\"\"");
        format!("{QUOTE}{escaped}{QUOTE}")
    } else {
        value.to_string()
    }
}
