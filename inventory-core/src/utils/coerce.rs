//! Lenient conversions shared by ingestion and aggregation.
//!
//! Policy (fail-soft):
//! - Text cells are trimmed; blank means "no value".
//! - Booleans are `true` only for a case-insensitive `"true"` token; anything else is `false`.
//! - Numbers use locale-agnostic decimal parsing (`.` separator, no grouping);
//!   unparseable or non-finite input becomes `0.0`.
//! - JSON values count as numeric when they are numbers or numeric strings.
//!
//! Keep these single-sourced so the ingestor and the aggregator agree on what "zero" means.

use serde_json::Value;

/// Canonical token for boolean cells (compared case-insensitively).
pub const TRUE_TOKEN: &str = "true";

/// Default for numeric cells that are blank or fail to parse.
pub const NUMBER_DEFAULT: f64 = 0.0;

/// Parse a boolean cell. Default: `false`.
pub fn bool_or_false(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(TRUE_TOKEN)
}

/// Parse a decimal cell. Default: [`NUMBER_DEFAULT`].
pub fn number_or_zero(raw: &str) -> f64 {
    parse_finite(raw).unwrap_or(NUMBER_DEFAULT)
}

/// Parse an integer cell, falling back to `default` when blank, unparseable, or zero.
///
/// Decimal input is truncated toward zero (`"2.7"` → `2`).
pub fn integer_or(raw: &str, default: i64) -> i64 {
    match parse_finite(raw) {
        Some(n) if n.trunc() != 0.0 => n.trunc() as i64,
        _ => default,
    }
}

/// Strict-but-finite decimal parse; `None` for blank, malformed, `NaN` or infinities.
pub fn parse_finite(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Read a JSON value as a finite number.
///
/// `null`, booleans, objects, arrays and non-numeric strings yield `None`.
pub fn value_as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_finite(s),
        _ => None,
    }
}

/// Read a JSON value as non-blank text (trimmed). Numbers and booleans are rendered.
pub fn value_as_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

/// Convert an `f64` into a JSON number, using an integer representation when exact.
///
/// Keeps `1200` as `1200` rather than `1200.0` so equality filters against integer
/// literals match ingested values.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::from(0))
    }
}
