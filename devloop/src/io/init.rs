//! Paths and scaffolding for the `.devloop/` directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use super::config::{DevloopConfig, write_config};

/// Canonical paths within `.devloop/` for a project root.
#[derive(Debug, Clone)]
pub struct DevloopPaths {
    pub root: PathBuf,
    pub devloop_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub history_path: PathBuf,
}

impl DevloopPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let devloop_dir = root.join(".devloop");
        Self {
            config_path: devloop_dir.join("config.toml"),
            state_path: devloop_dir.join("state.json"),
            history_path: devloop_dir.join("history.json"),
            devloop_dir,
            root,
        }
    }
}

/// Write the default config into `root/.devloop/`.
///
/// Refuses to overwrite an existing config unless `force` is set. Persisted
/// state and history are left untouched either way.
pub fn init_devloop(root: &Path, force: bool) -> Result<DevloopPaths> {
    let paths = DevloopPaths::new(root);
    if paths.devloop_dir.exists() && !paths.devloop_dir.is_dir() {
        return Err(anyhow!("devloop init: .devloop exists but is not a directory"));
    }
    if paths.config_path.exists() && !force {
        return Err(anyhow!(
            "devloop init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }
    write_config(&paths.config_path, &DevloopConfig::default())?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_writes_default_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_devloop(temp.path(), false).expect("init");
        assert!(paths.devloop_dir.is_dir());
        assert_eq!(
            load_config(&paths.config_path).expect("load"),
            DevloopConfig::default()
        );
    }

    #[test]
    fn init_without_force_refuses_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_devloop(temp.path(), false).expect("init");
        let err = init_devloop(temp.path(), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_restores_defaults_and_keeps_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_devloop(temp.path(), false).expect("init");
        fs::write(&paths.config_path, "max_steps = 99\n").expect("customize");
        fs::write(&paths.state_path, "{}\n").expect("state");

        init_devloop(temp.path(), true).expect("re-init");

        assert_eq!(load_config(&paths.config_path).expect("load").max_steps, 10);
        assert_eq!(fs::read_to_string(&paths.state_path).expect("read"), "{}\n");
    }
}
