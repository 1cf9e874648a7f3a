// inventory-core/src/commands/api.rs
use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::Path;

use crate::commands::init::ensure_initialized;
use crate::config::InventoryConfig;
use crate::services::aggregator::{Summary, SummaryOptions, summarize_with};
use crate::services::audit::{AuditLog, Severity};
use crate::services::ingestor::{IngestMapping, Ingestor};
use crate::services::query::{QueryError, QueryResult};
use crate::services::record::{ID_FIELD, Record};
use crate::services::store::RecordStore;

/// One store, one audit log and the summary settings, wired from a workspace root.
pub struct Inventory {
    store: RecordStore,
    audit: AuditLog,
    summary: SummaryOptions,
    config: InventoryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub id: Option<String>,
    pub error: QueryError,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub table: String,
    pub parsed: usize,
    pub inserted: usize,
    pub dry_run: bool,
    pub dropped_rows: usize,
    pub unbalanced_rows: usize,
    pub missing_columns: Vec<String>,
    pub failed: Vec<ImportFailure>,
}

impl Inventory {
    /// Initialize `root` if needed, then open the configured backend.
    pub fn open(root: &Path) -> Result<Self> {
        let report = ensure_initialized(root)?;
        let store = RecordStore::from_config(&report.config)?;
        Ok(Self::from_parts(store, report.config))
    }

    /// Wire an existing store (tests, embedding) with `config` for audit and summaries.
    pub fn from_parts(store: RecordStore, config: InventoryConfig) -> Self {
        Self {
            store,
            audit: AuditLog::from_config(&config.audit),
            summary: SummaryOptions::from(&config.summary),
            config,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn list(&self, table: &str) -> QueryResult<Vec<Record>> {
        self.store.table(table).select().execute()
    }

    pub fn get(&self, table: &str, id: &str) -> QueryResult<Record> {
        self.store.table(table).select().filter(ID_FIELD, id).one().execute()
    }

    pub fn insert(&self, table: &str, partial: Value) -> QueryResult<Record> {
        let res = self.store.table(table).insert(partial).execute();
        if let Some(r) = res.data() {
            self.audit.record_action(
                "store",
                "record_inserted",
                &json!({ "table": table, "id": r.id() }),
                Severity::Low,
            );
        }
        res
    }

    pub fn update(&self, table: &str, id: &str, patch: Value) -> QueryResult<Record> {
        let fields: Vec<String> = patch
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        let res = self.store.table(table).update(ID_FIELD, id, patch).execute();
        if res.is_ok() {
            self.audit.record_action(
                "store",
                "record_updated",
                &json!({ "table": table, "id": id, "fields": fields }),
                Severity::Low,
            );
        }
        res
    }

    pub fn delete(&self, table: &str, id: &str) -> QueryResult<usize> {
        let res = self.store.table(table).delete(ID_FIELD, id).execute();
        if let Some(removed) = res.data() {
            self.audit.record_action(
                "store",
                "record_deleted",
                &json!({ "table": table, "id": id, "removed": removed }),
                Severity::Medium,
            );
        }
        res
    }

    /// Parse `text` with `mapping` and insert each record into `table`.
    ///
    /// Rows are inserted in source order; a failed insert is reported and the rest continue.
    /// With `dry_run` nothing is written.
    pub fn import_csv(
        &self,
        table: &str,
        text: &str,
        mapping: IngestMapping,
        dry_run: bool,
    ) -> ImportReport {
        let ingest = Ingestor::new(mapping).ingest(text);
        let mut report = ImportReport {
            table: table.to_string(),
            parsed: ingest.records.len(),
            dry_run,
            dropped_rows: ingest.dropped_rows,
            unbalanced_rows: ingest.unbalanced_rows,
            missing_columns: ingest.missing_columns,
            ..ImportReport::default()
        };
        if dry_run {
            return report;
        }

        let rows = self.store.table(table);
        for record in ingest.records {
            let id = record.id().map(str::to_string);
            match rows.insert(record).execute().into_result() {
                Ok(_) => report.inserted += 1,
                Err(error) => report.failed.push(ImportFailure { id, error }),
            }
        }

        self.audit.record_action(
            "ingestor",
            "csv_imported",
            &json!({
                "table": table,
                "parsed": report.parsed,
                "inserted": report.inserted,
                "failed": report.failed.len(),
                "dropped_rows": report.dropped_rows,
            }),
            if report.failed.is_empty() { Severity::Low } else { Severity::Medium },
        );
        report
    }

    /// Dashboard summary over every record in `table`.
    pub fn summary(&self, table: &str) -> QueryResult<Summary> {
        self.list(table)
            .map(|records| summarize_with(&records, &self.summary))
    }

    /// End the session; see [`RecordStore::sign_out`] for the data-erasure behaviour.
    pub fn sign_out(&self) -> QueryResult<()> {
        let res = self.store.sign_out();
        self.audit.record_action(
            "session",
            "signed_out",
            &json!({
                "tables_erased": self.store.options().clear_on_sign_out && res.is_ok(),
            }),
            Severity::High,
        );
        res
    }
}
