use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use inventory_core::commands::{Inventory, ensure_initialized, ensure_initialized_once};
use inventory_core::config::InventoryConfig;
use inventory_core::services::history::{
    RawHistoryRow, history_from_csv, parse_history, to_csv, unique_assets, unique_users,
};
use inventory_core::services::ingestor::IngestMapping;
use inventory_core::services::query::QueryResult;

#[derive(Parser)]
#[command(
    name = "inventory-admin",
    about = "Admin helpers for the local asset inventory store"
)]
struct Cli {
    /// Workspace root (defaults to $INVENTORY_ROOT, else .inventory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the workspace layout and default config
    Init,
    /// Print every record in a table
    List { table: String },
    /// Print one record by id
    Get { table: String, id: String },
    /// Insert a record from a JSON object
    Insert { table: String, json: String },
    /// Merge a JSON object into the record with this id
    Update {
        table: String,
        id: String,
        json: String,
    },
    /// Delete records with this id
    Delete { table: String, id: String },
    /// Ingest a CSV file into a table
    Import {
        file: PathBuf,
        #[arg(long, default_value = "assets")]
        table: String,
        #[arg(long, value_enum, default_value_t = Mapping::Inventory)]
        mapping: Mapping,
        /// Parse and report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the dashboard summary for a table
    Summary {
        #[arg(long, default_value = "assets")]
        table: String,
    },
    /// Parse an asset-history export (.json or .csv)
    History {
        file: PathBuf,
        /// Emit the CSV export instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// End the session (erases persisted tables when configured)
    SignOut,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mapping {
    Inventory,
    Salesforce,
}

impl Mapping {
    fn build(self) -> IngestMapping {
        match self {
            Mapping::Inventory => IngestMapping::inventory_assets(),
            Mapping::Salesforce => IngestMapping::salesforce_assets(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let explicit_root = cli.root.is_some();
    let root = cli.root.unwrap_or_else(InventoryConfig::default_root);
    debug!(root = %root.display(), "workspace root");

    match cli.cmd {
        Cmd::Init => {
            let report = if explicit_root {
                ensure_initialized(&root)?
            } else {
                ensure_initialized_once()?.clone()
            };
            println!("initialized {}", report.root.display());
            for c in &report.created {
                println!("  created {c}");
            }
            Ok(())
        }
        Cmd::List { table } => emit(Inventory::open(&root)?.list(&table)),
        Cmd::Get { table, id } => emit(Inventory::open(&root)?.get(&table, &id)),
        Cmd::Insert { table, json } => {
            let partial = parse_json(&json)?;
            emit(Inventory::open(&root)?.insert(&table, partial))
        }
        Cmd::Update { table, id, json } => {
            let patch = parse_json(&json)?;
            emit(Inventory::open(&root)?.update(&table, &id, patch))
        }
        Cmd::Delete { table, id } => emit(Inventory::open(&root)?.delete(&table, &id)),
        Cmd::Import {
            file,
            table,
            mapping,
            dry_run,
        } => {
            let text = read_text(&file)?;
            let report = Inventory::open(&root)?.import_csv(&table, &text, mapping.build(), dry_run);
            print_json(&report)
        }
        Cmd::Summary { table } => emit(Inventory::open(&root)?.summary(&table)),
        Cmd::History { file, csv } => history(&file, csv),
        Cmd::SignOut => emit(Inventory::open(&root)?.sign_out()),
    }
}

/// Print `{data, error}`; a populated error also fails the process.
fn emit<T: Serialize>(res: QueryResult<T>) -> Result<()> {
    print_json(&res)?;
    match res.into_result() {
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn history(file: &Path, csv: bool) -> Result<()> {
    let text = read_text(file)?;
    let entries = if file.extension().is_some_and(|e| e == "json") {
        let rows: Vec<RawHistoryRow> = serde_json::from_str(&text)
            .with_context(|| format!("parsing history rows in {}", file.display()))?;
        parse_history(rows)
    } else {
        history_from_csv(&text)
    };

    if csv {
        println!("{}", to_csv(&entries));
        return Ok(());
    }
    print_json(&serde_json::json!({
        "entries": entries,
        "assets": unique_assets(&entries),
        "users": unique_users(&entries),
    }))
}

fn parse_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("argument is not valid JSON")
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn print_json<T: Serialize>(val: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
