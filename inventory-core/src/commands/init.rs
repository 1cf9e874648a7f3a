// inventory-core/src/commands/init.rs

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::InventoryConfig;
use crate::utils::atomic::write_atomic;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
    pub config: InventoryConfig,
}

// ---------- process-wide init for the default root ----------

static INIT: OnceCell<InitReport> = OnceCell::new();

/// Initialize [`InventoryConfig::default_root`] once per process.
pub fn ensure_initialized_once() -> Result<&'static InitReport> {
    INIT.get_or_try_init(|| ensure_initialized(&InventoryConfig::default_root()))
}

/// Create the on-disk layout under `root` (idempotent) and load its config.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(root, "", &mut created, &mut existed)?;
    ensure_dir(root, "cache", &mut created, &mut existed)?;
    ensure_dir(root, "tables", &mut created, &mut existed)?;
    ensure_dir(root, "logbook", &mut created, &mut existed)?;

    ensure_file(
        root,
        "config.toml",
        DEFAULT_CONFIG_TOML,
        &mut created,
        &mut existed,
    )?;

    let ts = Utc::now().to_rfc3339();
    let init_event = format!(
        r#"{{"timestamp":"{ts}","event":"system_init","agent":"system","data":{{"version":"{}"}}}}"#,
        env!("CARGO_PKG_VERSION")
    );
    ensure_seeded_jsonl(
        &root.join("logbook"),
        "actions.jsonl",
        &init_event,
        &mut created,
        &mut existed,
    )?;

    let config = InventoryConfig::load(root)?;
    Ok(InitReport {
        root: root.to_path_buf(),
        created,
        existed,
        config,
    })
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    let label = if rel.is_empty() { ".".to_string() } else { rel.to_string() };
    if p.exists() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn ensure_seeded_jsonl(
    dir: &Path,
    file: &str,
    init_line: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = dir.join(file);
    let label = format!("logbook/{file}");
    if !p.exists() {
        write_atomic(&p, format!("{init_line}\n").as_bytes())?;
        created.push(label);
        return Ok(());
    }
    existed.push(label);
    // exists but empty: seed it
    if fs::metadata(&p)?.len() == 0 {
        let mut f = OpenOptions::new().append(true).open(&p)?;
        f.write_all(init_line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

// ---------- defaults ----------

pub const DEFAULT_CONFIG_TOML: &str = r#"[system]
name = "inventory"
version = "0.1.0"

[storage]
# sqlite | file | memory
backend = "sqlite"
sqlite_path = "cache/storage.db"
files_dir = "tables"
key_prefix = "mock_"

[session]
user_id = "b79130a6-125e-4ec7-964e-3486238597e2"
email = "demo@example.com"
# Sign-out also erases every persisted table under key_prefix.
clear_on_sign_out = true

[summary]
high_value_threshold = 10000.0
# unclassified | title_case
condition_fallback = "unclassified"

[audit]
enabled = true
path = "logbook/actions.jsonl"
"#;
