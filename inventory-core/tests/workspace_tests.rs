// tests/workspace_tests.rs
// Config loading, on-disk init, and the Inventory facade (import, summary, audit, sign-out).

use std::fs;

use anyhow::Result;
use serde_json::{Value, json};

use inventory_core::commands::{Inventory, ensure_initialized};
use inventory_core::config::{ConditionFallback, InventoryConfig, StorageBackend};
use inventory_core::services::ingestor::IngestMapping;
use inventory_core::services::store::RecordStore;

fn audit_lines(root: &std::path::Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(root.join("logbook").join("actions.jsonl"))?;
    text.lines()
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}

#[test]
fn config_defaults_apply_to_missing_sections() -> Result<()> {
    let cfg = InventoryConfig::from_toml("[storage]\nbackend = \"file\"\n")?;
    assert_eq!(cfg.storage.backend, StorageBackend::File);
    assert_eq!(cfg.storage.key_prefix, "mock_");
    assert_eq!(cfg.session.email, "demo@example.com");
    assert!(cfg.session.clear_on_sign_out);
    assert_eq!(cfg.summary.high_value_threshold, 10_000.0);
    assert_eq!(cfg.summary.condition_fallback, ConditionFallback::Unclassified);
    assert!(cfg.audit.enabled);
    Ok(())
}

#[test]
fn config_rejects_unknown_backend() {
    assert!(InventoryConfig::from_toml("[storage]\nbackend = \"redis\"\n").is_err());
}

#[test]
fn load_without_file_uses_defaults_under_root() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = InventoryConfig::load(dir.path())?;
    assert_eq!(cfg.storage.sqlite_path, dir.path().join("cache/storage.db"));
    assert_eq!(cfg.audit.path, dir.path().join("logbook/actions.jsonl"));
    Ok(())
}

#[test]
fn init_is_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("ws");

    let first = ensure_initialized(&root)?;
    for entry in ["cache", "tables", "logbook", "config.toml", "logbook/actions.jsonl"] {
        assert!(first.created.contains(&entry.to_string()), "{entry} not created");
    }
    assert_eq!(first.config.storage.backend, StorageBackend::Sqlite);

    let second = ensure_initialized(&root)?;
    assert!(second.created.is_empty());
    assert!(second.existed.contains(&"config.toml".to_string()));

    let seeded = audit_lines(&root)?;
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0]["event"], "system_init");
    Ok(())
}

#[test]
fn inventory_round_trip_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    {
        let inv = Inventory::open(root)?;
        let created = inv
            .insert("assets", json!({ "id": "disk-1", "asset_name": "Saw" }))
            .into_result()?;
        assert_eq!(created.get_str("category"), Some("Other"));
        inv.update("assets", "disk-1", json!({ "current_value": 42 })).into_result()?;
    }

    let inv = Inventory::open(root)?;
    let got = inv.get("assets", "disk-1").into_result()?;
    assert_eq!(got.get_number("current_value"), Some(42.0));
    assert_eq!(inv.list("assets").data().map(Vec::len), Some(4));
    assert_eq!(inv.delete("assets", "disk-1").data(), Some(&1));

    let actions: Vec<String> = audit_lines(root)?
        .iter()
        .filter_map(|v| v["action"].as_str().map(str::to_string))
        .collect();
    assert_eq!(actions, vec!["record_inserted", "record_updated", "record_deleted"]);
    Ok(())
}

#[test]
fn import_csv_inserts_and_reports_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = InventoryConfig::load(dir.path())?;
    let inv = Inventory::from_parts(RecordStore::in_memory(), cfg);

    let csv = "\
id,asset_name,category,purchase_cost,current_value,status
c-1,Generator,Power,15000,12000,in_maintenance
1,Duplicate of seed,Other,10,,
[id],placeholder,,,,
c-2,\"Ladder, 3m\",Tools,200,,IN_MAINTENANCE
";
    let dry = inv.import_csv("assets", csv, IngestMapping::inventory_assets(), true);
    assert_eq!(dry.parsed, 3);
    assert_eq!(dry.inserted, 0);
    assert_eq!(inv.list("assets").data().map(Vec::len), Some(3));

    let report = inv.import_csv("assets", csv, IngestMapping::inventory_assets(), false);
    assert_eq!(report.parsed, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.dropped_rows, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id.as_deref(), Some("1"));

    let ladder = inv.get("assets", "c-2").into_result()?;
    assert_eq!(ladder.get_str("asset_name"), Some("Ladder, 3m"));
    assert_eq!(ladder.get_str("condition"), Some("good"));

    let summary = inv.summary("assets").into_result()?;
    assert_eq!(summary.total_count, 5);
    assert_eq!(summary.high_value_assets, 2);
    let maintenance = summary
        .status_data
        .iter()
        .find(|b| b.name == "In Maintenance")
        .map(|b| b.count);
    assert_eq!(maintenance, Some(2));
    Ok(())
}

#[test]
fn summary_honours_configured_threshold() -> Result<()> {
    let mut cfg = InventoryConfig::default();
    cfg.summary.high_value_threshold = 1000.0;
    cfg.audit.enabled = false;
    let inv = Inventory::from_parts(RecordStore::in_memory(), cfg);
    let s = inv.summary("assets").into_result()?;
    assert_eq!(s.high_value_assets, 2);
    Ok(())
}

#[test]
fn sign_out_is_audited_and_erases_tables() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path())?;
    fs::write(
        dir.path().join("config.toml"),
        "[storage]\nbackend = \"file\"\n",
    )?;

    let inv = Inventory::open(dir.path())?;
    inv.insert("assets", json!({ "id": "gone-soon" })).into_result()?;
    assert!(dir.path().join("tables").join("mock_assets.json").exists());

    inv.sign_out().into_result()?;
    assert!(!dir.path().join("tables").join("mock_assets.json").exists());
    assert!(inv.store().session().is_none());

    let last = audit_lines(dir.path())?
        .pop()
        .unwrap_or(Value::Null);
    assert_eq!(last["action"], "signed_out");
    assert_eq!(last["severity"], "high");
    assert_eq!(last["details"]["tables_erased"], true);
    Ok(())
}
