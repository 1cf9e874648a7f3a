use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default workspace root; overridable through `INVENTORY_ROOT`.
pub const DEFAULT_ROOT: &str = ".inventory";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl InventoryConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Self::from_toml(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using InventoryConfig::default().",
                path.display()
            );
            InventoryConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    /// Parse without touching the filesystem; paths stay relative.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str::<InventoryConfig>(text)?)
    }

    /// Workspace root from `INVENTORY_ROOT`, else [`DEFAULT_ROOT`].
    pub fn default_root() -> PathBuf {
        std::env::var_os("INVENTORY_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.storage.sqlite_path = absolutize(root, &self.storage.sqlite_path);
        self.storage.files_dir = absolutize(root, &self.storage.files_dir);
        self.audit.path = absolutize(root, &self.audit.path);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "inventory".to_string()
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "StorageConfig::default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "StorageConfig::default_files_dir")]
    pub files_dir: PathBuf,
    /// Namespace for persisted tables: key = `<key_prefix><table>`.
    #[serde(default = "StorageConfig::default_key_prefix")]
    pub key_prefix: String,
}

impl StorageConfig {
    fn default_sqlite_path() -> PathBuf {
        PathBuf::from("cache/storage.db")
    }

    fn default_files_dir() -> PathBuf {
        PathBuf::from("tables")
    }

    fn default_key_prefix() -> String {
        "mock_".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: Self::default_sqlite_path(),
            files_dir: Self::default_files_dir(),
            key_prefix: Self::default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_user_id")]
    pub user_id: String,
    #[serde(default = "SessionConfig::default_email")]
    pub email: String,
    /// Sign-out also erases every persisted table. Kept on by default to match the
    /// behaviour UI code was written against; it ties data lifetime to the session.
    #[serde(default = "SessionConfig::default_clear_on_sign_out")]
    pub clear_on_sign_out: bool,
}

impl SessionConfig {
    fn default_user_id() -> String {
        "b79130a6-125e-4ec7-964e-3486238597e2".to_string()
    }

    fn default_email() -> String {
        "demo@example.com".to_string()
    }

    fn default_clear_on_sign_out() -> bool {
        true
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: Self::default_user_id(),
            email: Self::default_email(),
            clear_on_sign_out: Self::default_clear_on_sign_out(),
        }
    }
}

/// How condition strings outside {excellent, good, fair, poor} are bucketed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFallback {
    /// One shared `Unclassified` bucket.
    #[default]
    Unclassified,
    /// Title-case the raw value into its own bucket.
    TitleCase,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "SummaryConfig::default_high_value_threshold")]
    pub high_value_threshold: f64,
    #[serde(default)]
    pub condition_fallback: ConditionFallback,
}

impl SummaryConfig {
    fn default_high_value_threshold() -> f64 {
        10_000.0
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: Self::default_high_value_threshold(),
            condition_fallback: ConditionFallback::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "AuditConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "AuditConfig::default_path")]
    pub path: PathBuf,
}

impl AuditConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_path() -> PathBuf {
        PathBuf::from("logbook/actions.jsonl")
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            path: Self::default_path(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
