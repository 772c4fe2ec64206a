//! Bootstrap of the `.auditflow/` directory.
//!
//! ```text
//! .auditflow/
//! ├── auditflow.toml   # Configuration (defaults written on first init)
//! └── auditflow.db     # SQLite database, created by `auditflow init`
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{AuditflowToml, CONFIG_FILE};

/// The name of the auditflow configuration directory.
pub const AUDITFLOW_DIR: &str = ".auditflow";

#[derive(Debug)]
pub struct InitResult {
    /// Path to the .auditflow directory
    pub config_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
    /// Whether a default auditflow.toml was written
    pub config_written: bool,
}

/// Create `.auditflow/` and a default config. Existing files are never overwritten.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let config_dir = project_dir.join(AUDITFLOW_DIR);
    let created = !config_dir.exists();

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create directory: {}", config_dir.display()))?;

    let config_file = config_dir.join(CONFIG_FILE);
    let config_written = if config_file.exists() {
        false
    } else {
        AuditflowToml::default().save(&config_file)?;
        true
    };

    Ok(InitResult {
        config_dir,
        created,
        config_written,
    })
}

pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(AUDITFLOW_DIR).exists()
}

pub fn get_auditflow_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(AUDITFLOW_DIR)
}
