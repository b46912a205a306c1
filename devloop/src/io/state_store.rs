//! Persisted project state (`.devloop/state.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::atomic::write_atomic;
use crate::core::types::ProjectState;

pub fn load_state(path: &Path) -> Result<ProjectState> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read state {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse state {}", path.display()))
}

/// Load state, or `None` if no session has been persisted yet.
pub fn load_state_if_exists(path: &Path) -> Result<Option<ProjectState>> {
    if !path.exists() {
        return Ok(None);
    }
    load_state(path).map(Some)
}

/// Atomically write state as pretty JSON with a trailing newline.
pub fn write_state(path: &Path, state: &ProjectState) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
