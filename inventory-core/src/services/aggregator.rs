//! services/aggregator.rs
//!
//! Pure reduction of asset records into the dashboard [`Summary`].
//!
//! Fields read: `current_value`, `purchase_cost`, `category`, `status`, `condition`.
//! Effective value = `current_value`, else `purchase_cost`, else `0`.
//! No output number is ever `NaN` or infinite.

use serde::Serialize;
use std::collections::HashMap;

use crate::config::{ConditionFallback, SummaryConfig};
use crate::services::record::Record;
use crate::utils::coerce;

pub const CURRENT_VALUE: &str = "current_value";
pub const PURCHASE_COST: &str = "purchase_cost";
pub const CATEGORY: &str = "category";
pub const STATUS: &str = "status";
pub const CONDITION: &str = "condition";

/// Bucket used for conditions outside the canonical four (default fallback).
pub const UNCLASSIFIED: &str = "Unclassified";

/// Natural-language condition buckets rendered last, in this order.
const CONDITION_ORDER: [&str; 3] = ["Good", "Fair", "Poor"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_value: f64,
    pub total_count: usize,
    /// Fraction of purchase cost lost: `(purchase − current) / purchase`; `0` without purchase data.
    pub depreciation: f64,
    pub high_value_assets: usize,
    pub category_data: Vec<Bucket>,
    pub status_data: Vec<Bucket>,
    pub condition_data: Vec<Bucket>,
}

impl Summary {
    /// Mean effective value; `0` for an empty input.
    pub fn average_value(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.total_value / self.total_count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryOptions {
    /// Effective values strictly above this count as high-value.
    pub high_value_threshold: f64,
    pub condition_fallback: ConditionFallback,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::from(&SummaryConfig::default())
    }
}

impl From<&SummaryConfig> for SummaryOptions {
    fn from(cfg: &SummaryConfig) -> Self {
        Self {
            high_value_threshold: cfg.high_value_threshold,
            condition_fallback: cfg.condition_fallback,
        }
    }
}

pub fn summarize(records: &[Record]) -> Summary {
    summarize_with(records, &SummaryOptions::default())
}

pub fn summarize_with(records: &[Record], opts: &SummaryOptions) -> Summary {
    let mut total_value = 0.0;
    let mut purchase_total = 0.0;
    let mut high_value_assets = 0;
    let mut categories = Buckets::default();
    let mut statuses = Buckets::default();
    let mut conditions = Buckets::default();

    for r in records {
        let value = effective_value(r);
        total_value += value;
        purchase_total += r.get_number(PURCHASE_COST).unwrap_or(0.0);
        if value > opts.high_value_threshold {
            high_value_assets += 1;
        }

        if let Some(category) = non_blank(r, CATEGORY) {
            categories.add(&category, Some(value));
        }
        if let Some(status) = non_blank(r, STATUS) {
            statuses.add(&normalize_status(&status), None);
        }
        if let Some(condition) = non_blank(r, CONDITION) {
            conditions.add(&normalize_condition(&condition, opts.condition_fallback), None);
        }
    }

    let depreciation = if purchase_total > 0.0 {
        let d = (purchase_total - total_value) / purchase_total;
        if d.is_finite() { d } else { 0.0 }
    } else {
        0.0
    };

    let mut condition_data = conditions.into_vec();
    // stable: unranked buckets keep first-seen order ahead of Good, Fair, Poor
    condition_data.sort_by_key(|b| {
        CONDITION_ORDER
            .iter()
            .position(|n| *n == b.name)
            .map_or(-1, |i| i as i32)
    });

    Summary {
        total_value,
        total_count: records.len(),
        depreciation,
        high_value_assets,
        category_data: categories.into_vec(),
        status_data: statuses.into_vec(),
        condition_data,
    }
}

/// `current_value`, else `purchase_cost`, else `0`.
pub fn effective_value(r: &Record) -> f64 {
    r.get_number(CURRENT_VALUE)
        .or_else(|| r.get_number(PURCHASE_COST))
        .unwrap_or(0.0)
}

/// `in_maintenance`, `In_Maintenance`, `IN MAINTENANCE` → `In Maintenance`;
/// `non-operational` → `Non-Operational`.
pub fn normalize_status(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .map(capitalize_segments)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map onto `Excellent | Good | Fair | Poor`; `xc…` abbreviations read as `Excellent`.
pub fn normalize_condition(raw: &str, fallback: ConditionFallback) -> String {
    let c = raw.trim().to_lowercase();
    match c.as_str() {
        "excellent" => "Excellent".to_string(),
        _ if c.starts_with("xc") => "Excellent".to_string(),
        "good" => "Good".to_string(),
        "fair" => "Fair".to_string(),
        "poor" => "Poor".to_string(),
        _ => match fallback {
            ConditionFallback::Unclassified => UNCLASSIFIED.to_string(),
            ConditionFallback::TitleCase => capitalize(&c),
        },
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn non_blank(r: &Record, field: &str) -> Option<String> {
    r.get(field).and_then(coerce::value_as_text)
}

/// Insertion-ordered accumulator.
#[derive(Default)]
struct Buckets {
    order: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl Buckets {
    fn add(&mut self, name: &str, value: Option<f64>) {
        let idx = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.order.push(Bucket {
                    name: name.to_string(),
                    count: 0,
                    value: value.map(|_| 0.0),
                });
                self.index.insert(name.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let bucket = &mut self.order[idx];
        bucket.count += 1;
        if let (Some(total), Some(v)) = (bucket.value.as_mut(), value) {
            *total += v;
        }
    }

    fn into_vec(self) -> Vec<Bucket> {
        self.order
    }
}

/// Uppercase the first letter of every alphanumeric run in `word`.
fn capitalize_segments(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_boundary = true;
    for ch in word.chars() {
        if at_boundary && ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_boundary = !ch.is_alphanumeric();
    }
    out
}
