//! services/audit.rs
//! Action logbook: one JSON object per line in `<root>/logbook/actions.jsonl`.
//!
//! - Best effort: a failed append is logged through `tracing` and otherwise ignored.
//! - Disabled logs (`[audit] enabled = false`) accept calls and write nothing.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::AuditConfig;
use crate::utils::atomic::append_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    actions: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            actions: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { actions: None }
    }

    pub fn from_config(cfg: &AuditConfig) -> Self {
        if cfg.enabled {
            Self::new(cfg.path.clone())
        } else {
            Self::disabled()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.actions.as_deref()
    }

    /// Append an action entry: `{timestamp, event:"action", agent, action, severity, details}`.
    pub fn record_action(&self, agent: &str, action: &str, details: &Value, severity: Severity) {
        let Some(path) = &self.actions else {
            return;
        };
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": "action",
            "agent": agent,
            "action": action,
            "severity": severity.as_str(),
            "details": details
        });
        append_jsonl(path, &entry);
    }
}

fn append_jsonl<S: Serialize>(path: &Path, val: &S) {
    let line = match serde_json::to_string(val) {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, "audit entry not serialisable");
            return;
        }
    };
    if let Err(e) = append_line(path, line.as_bytes()) {
        warn!(path = %path.display(), error = %e, "audit append failed");
    }
}
