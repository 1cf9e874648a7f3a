//! services/ingestor.rs
//!
//! Delimited-text ingestion: quoted-field CSV lines → typed [`Record`]s.
//!
//! Line format: `,` separates fields; a field may be wrapped in `"`; inside quotes a
//! doubled `""` is one literal quote and `,` is plain data. The first non-blank line is
//! the header. Header names are resolved to column indexes once per run.
//!
//! Policy is fail-soft throughout: unparseable numbers become zero (or the field's
//! default), rows without an identity are dropped, and a line that ends inside an open
//! quote is kept as scanned and counted in the report.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::services::record::{ID_FIELD, Record};
use crate::utils::coerce;

pub const SEPARATOR: char = ',';
pub const QUOTE: char = '"';

/// Split one line into raw fields.
///
/// `A,"B,C","D""E"` → `["A", "B,C", "D\"E"]`.
pub fn parse_line(line: &str) -> Vec<String> {
    scan_line(line).0
}

/// Like [`parse_line`], also reporting whether every opened quote was closed.
pub fn scan_line(line: &str) -> (Vec<String>, bool) {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    chars.next();
                    current.push(QUOTE);
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == QUOTE {
            in_quotes = true;
        } else if c == SEPARATOR {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    (fields, !in_quotes)
}

/// One scanned data line. Transient: it has no identity until mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// 1-based line number in the source text.
    pub line_no: usize,
    pub fields: Vec<String>,
    pub balanced: bool,
}

impl CsvRow {
    /// Trimmed cell at `idx`; blank when the column is absent or the row is short.
    pub fn cell(&self, idx: Option<usize>) -> &str {
        idx.and_then(|i| self.fields.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Header names plus every non-blank data line, in source order.
pub fn read_rows(text: &str) -> (Vec<String>, Vec<CsvRow>) {
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let Some((_, header_line)) = lines.next() else {
        return (Vec::new(), Vec::new());
    };
    let header = parse_line(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = lines
        .map(|(line_no, line)| {
            let (fields, balanced) = scan_line(line);
            CsvRow {
                line_no,
                fields,
                balanced,
            }
        })
        .collect();
    (header, rows)
}

/// `true` for identity cells that mean "no data": blank, or a bracketed token like `[Asset]`.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || (v.len() >= 2 && v.starts_with('[') && v.ends_with(']'))
}

// ----------- mappings -----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// Case-insensitive `"true"`, else `false`.
    Bool,
    /// Decimal; malformed → `0`.
    Number,
    /// Truncated integer; malformed or zero → the field default (else `0`).
    Integer,
}

/// What a blank cell turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum OnBlank {
    /// The kind's zero value: `""`, `false`, `0`.
    Coerce,
    /// A fixed value.
    Use(Value),
    /// Leave the field out of the record.
    Omit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub column: String,
    pub field: String,
    pub kind: FieldKind,
    pub on_blank: OnBlank,
}

impl FieldSpec {
    fn new(column: &str, field: &str, kind: FieldKind) -> Self {
        Self {
            column: column.to_string(),
            field: field.to_string(),
            kind,
            on_blank: OnBlank::Coerce,
        }
    }

    pub fn text(column: &str, field: &str) -> Self {
        Self::new(column, field, FieldKind::Text)
    }

    pub fn boolean(column: &str, field: &str) -> Self {
        Self::new(column, field, FieldKind::Bool)
    }

    pub fn number(column: &str, field: &str) -> Self {
        Self::new(column, field, FieldKind::Number)
    }

    pub fn integer(column: &str, field: &str) -> Self {
        Self::new(column, field, FieldKind::Integer)
    }

    pub fn or_default(mut self, value: impl Into<Value>) -> Self {
        self.on_blank = OnBlank::Use(value.into());
        self
    }

    pub fn omit_blank(mut self) -> Self {
        self.on_blank = OnBlank::Omit;
        self
    }

    /// Convert one trimmed cell. `None` means "leave the field out".
    fn convert(&self, raw: &str) -> Option<Value> {
        if raw.is_empty() {
            return match &self.on_blank {
                OnBlank::Omit => None,
                OnBlank::Use(v) => Some(v.clone()),
                OnBlank::Coerce => Some(self.zero()),
            };
        }
        let v = match self.kind {
            FieldKind::Text => Value::String(raw.to_string()),
            FieldKind::Bool => Value::Bool(coerce::bool_or_false(raw)),
            FieldKind::Number => coerce::number_value(coerce::number_or_zero(raw)),
            FieldKind::Integer => {
                let fallback = match &self.on_blank {
                    OnBlank::Use(v) => v.as_i64().unwrap_or(0),
                    _ => 0,
                };
                Value::from(coerce::integer_or(raw, fallback))
            }
        };
        Some(v)
    }

    fn zero(&self) -> Value {
        match self.kind {
            FieldKind::Text => Value::String(String::new()),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Number | FieldKind::Integer => Value::from(0),
        }
    }
}

/// Header-to-record mapping for one export format.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestMapping {
    /// Header column holding each row's identity; copied verbatim into `id`.
    pub identity_column: String,
    pub fields: Vec<FieldSpec>,
}

impl IngestMapping {
    pub fn new(identity_column: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            identity_column: identity_column.to_string(),
            fields,
        }
    }

    /// CRM asset export (`Id`, `Name`, `Name__c`, ...).
    pub fn salesforce_assets() -> Self {
        use FieldSpec as F;
        Self::new(
            "Id",
            vec![
                F::text("Name", "name").or_default("Unnamed Asset"),
                F::text("Name__c", "asset_code"),
                F::text("Account.Name", "account_name"),
                F::text("Asset_Type__c", "asset_type").or_default("General"),
                F::integer("AssetLevel", "asset_level").or_default(1),
                F::text("Assigned_Date__c", "assigned_date"),
                F::text("City", "city"),
                F::text("Country", "country"),
                F::text("Description", "description"),
                F::text("ConsequenceOfFailure", "consequence_of_failure").or_default("Low"),
                F::text("Equipment_Owner__c", "equipment_owner"),
                F::text("InstallDate", "install_date"),
                F::boolean("Is_Available__c", "is_available"),
                F::boolean("Is_a_client_asset__c", "is_client_asset"),
                F::boolean("Is_Specialized__c", "is_specialized"),
                F::number("Maintenance_Cost__c", "maintenance_cost"),
                F::text("ManufactureDate", "manufacture_date"),
                F::text("Owner.Name", "owner_name"),
                F::number("Price", "price"),
                F::text("ProductCode", "product_code"),
                F::text("UsageEndDate", "usage_end_date"),
                F::text("PostalCode", "postal_code"),
                F::text("Address", "address"),
            ],
        )
    }

    /// Columns named after the `assets` table fields. Blank cells are omitted so the
    /// store's insert defaults (and the value fallback in summaries) still apply.
    pub fn inventory_assets() -> Self {
        let text = |c: &str| FieldSpec::text(c, c).omit_blank();
        let number = |c: &str| FieldSpec::number(c, c).omit_blank();
        Self::new(
            ID_FIELD,
            vec![
                text("asset_name"),
                text("asset_tag"),
                text("category"),
                text("status"),
                text("condition"),
                text("manufacturer"),
                text("model_number"),
                text("serial_number"),
                text("department"),
                text("assigned_to"),
                text("purchase_date"),
                number("purchase_cost"),
                number("current_value"),
                text("warranty_expiration"),
            ],
        )
    }
}

/// Column index per mapped field, resolved once from the header.
struct ColumnPlan<'m> {
    identity: Option<usize>,
    fields: Vec<(Option<usize>, &'m FieldSpec)>,
    missing: Vec<String>,
}

impl<'m> ColumnPlan<'m> {
    fn resolve(header: &[String], mapping: &'m IngestMapping) -> Self {
        let index_of = |name: &str| header.iter().position(|h| h == name);
        let mut missing = Vec::new();

        let identity = index_of(&mapping.identity_column);
        if identity.is_none() {
            missing.push(mapping.identity_column.clone());
        }
        let fields = mapping
            .fields
            .iter()
            .map(|spec| {
                let idx = index_of(&spec.column);
                if idx.is_none() {
                    missing.push(spec.column.clone());
                }
                (idx, spec)
            })
            .collect();

        Self {
            identity,
            fields,
            missing,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub records: Vec<Record>,
    /// Rows dropped for a blank or placeholder identity.
    pub dropped_rows: usize,
    /// Rows that ended inside an open quote (kept as scanned).
    pub unbalanced_rows: usize,
    /// Mapped columns absent from the header; their cells read as blank.
    pub missing_columns: Vec<String>,
}

pub struct Ingestor {
    mapping: IngestMapping,
}

impl Ingestor {
    pub fn new(mapping: IngestMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &IngestMapping {
        &self.mapping
    }

    pub fn ingest(&self, text: &str) -> IngestReport {
        let (header, rows) = read_rows(text);
        let plan = ColumnPlan::resolve(&header, &self.mapping);
        if plan.identity.is_none() && !header.is_empty() {
            warn!(
                column = %self.mapping.identity_column,
                "identity column missing from header; every row will be dropped"
            );
        }

        let mut report = IngestReport {
            missing_columns: plan.missing.clone(),
            ..IngestReport::default()
        };

        for row in &rows {
            if !row.balanced {
                report.unbalanced_rows += 1;
                debug!(line = row.line_no, "unbalanced quote; row kept as scanned");
            }
            let id = row.cell(plan.identity);
            if is_placeholder(id) {
                report.dropped_rows += 1;
                continue;
            }

            let mut record = Record::new().with(ID_FIELD, id);
            for (idx, spec) in &plan.fields {
                if let Some(v) = spec.convert(row.cell(*idx)) {
                    record.set(spec.field.as_str(), v);
                }
            }
            report.records.push(record);
        }

        debug!(
            records = report.records.len(),
            dropped = report.dropped_rows,
            unbalanced = report.unbalanced_rows,
            "ingest complete"
        );
        report
    }
}
