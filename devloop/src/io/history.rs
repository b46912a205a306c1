//! Request history (`.devloop/history.json`): one record per CLI request.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::atomic::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub action: String,
    pub details: Value,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl RequestRecord {
    pub fn now(action: impl Into<String>, details: Value) -> Self {
        Self {
            action: action.into(),
            details,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Load all records; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<Vec<RequestRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read history {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse history {}", path.display()))
}

pub fn append_history(path: &Path, record: RequestRecord) -> Result<()> {
    let mut records = load_history(path)?;
    records.push(record);
    let mut buf = serde_json::to_string_pretty(&records).context("serialize history")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
