//! Configuration for auditflow.
//!
//! Settings are read from `.auditflow/auditflow.toml` and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [database]
//! path = "auditflow.db"
//!
//! [workflow]
//! advance_threshold = 80
//! write_timeout_ms = 5000
//! completeness_timeout_ms = 2000
//!
//! [logging]
//! level = "warn"
//! json = false
//!
//! [phases.labels]
//! follow_up = "Follow-up"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::access::{AccessPolicy, DEFAULT_ADVANCE_THRESHOLD};
use crate::init::get_auditflow_dir;
use crate::phase::{PhaseId, PhaseRegistry};
use crate::workflow::ControllerSettings;

pub const CONFIG_FILE: &str = "auditflow.toml";

/// Overrides the database location.
pub const DB_ENV: &str = "AUDITFLOW_DB";
/// Overrides the log filter.
pub const LOG_ENV: &str = "AUDITFLOW_LOG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Relative paths resolve against the `.auditflow` directory
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "auditflow.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Completeness the current phase needs before `advance` is allowed
    #[serde(default = "default_advance_threshold")]
    pub advance_threshold: u8,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_completeness_timeout_ms")]
    pub completeness_timeout_ms: u64,
}

fn default_advance_threshold() -> u8 {
    DEFAULT_ADVANCE_THRESHOLD
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_completeness_timeout_ms() -> u64 {
    2000
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            advance_threshold: default_advance_threshold(),
            write_timeout_ms: default_write_timeout_ms(),
            completeness_timeout_ms: default_completeness_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhasesConfig {
    /// Display-name overrides keyed by phase id
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Contents of `auditflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditflowToml {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub phases: PhasesConfig,
}

impl AuditflowToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse auditflow.toml")
    }

    /// Load `<dir>/auditflow.toml`, or defaults when the file doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize auditflow.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The standard registry with configured display names applied.
    /// Unknown label keys are ignored here and reported by `validate`.
    pub fn registry(&self) -> PhaseRegistry {
        let labels: HashMap<PhaseId, String> = self
            .phases
            .labels
            .iter()
            .filter_map(|(key, label)| key.parse().ok().map(|id| (id, label.clone())))
            .collect();
        PhaseRegistry::standard().with_labels(&labels)
    }

    /// Falls back to the default threshold when the configured one is out of range.
    pub fn controller_settings(&self) -> ControllerSettings {
        let policy = AccessPolicy::new(self.workflow.advance_threshold).unwrap_or_default();
        ControllerSettings {
            policy,
            write_timeout: Duration::from_millis(self.workflow.write_timeout_ms),
            completeness_timeout: Duration::from_millis(self.workflow.completeness_timeout_ms),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if AccessPolicy::new(self.workflow.advance_threshold).is_err() {
            warnings.push(format!(
                "Invalid advance_threshold {}: must be between 1 and 100 (using {})",
                self.workflow.advance_threshold, DEFAULT_ADVANCE_THRESHOLD
            ));
        }

        if self.workflow.write_timeout_ms == 0 {
            warnings.push("write_timeout_ms is 0: every phase write will time out".to_string());
        }

        if self.workflow.completeness_timeout_ms == 0 {
            warnings.push(
                "completeness_timeout_ms is 0: every phase will read as 0% complete".to_string(),
            );
        }

        if self.database.path.trim().is_empty() {
            warnings.push("database.path is empty".to_string());
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!("Invalid logging.level '{}'", self.logging.level));
        }

        for key in self.phases.labels.keys() {
            if key.parse::<PhaseId>().is_err() {
                warnings.push(format!(
                    "Unknown phase '{}' in [phases.labels]. Valid phases: {}",
                    key,
                    PhaseId::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        warnings
    }
}

/// Resolved configuration: the file merged with environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct AuditflowConfig {
    pub project_dir: PathBuf,
    /// Path to the .auditflow directory
    pub config_dir: PathBuf,
    pub toml: AuditflowToml,
    /// CLI override for the database path
    pub cli_db: Option<PathBuf>,
    pub verbose: bool,
}

impl AuditflowConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = get_auditflow_dir(&project_dir);
        let toml = AuditflowToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            cli_db: None,
            verbose: false,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, db: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_db = db;
        config.verbose = verbose;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Database path (CLI → env → file).
    pub fn db_path(&self) -> PathBuf {
        if let Some(ref path) = self.cli_db {
            return path.clone();
        }
        if let Ok(path) = std::env::var(DB_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        let configured = Path::new(&self.toml.database.path);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.config_dir.join(configured)
        }
    }

    /// Log filter directive (CLI → env → file).
    pub fn log_filter(&self) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        std::env::var(LOG_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| self.toml.logging.level.clone())
    }

    pub fn log_json(&self) -> bool {
        self.toml.logging.json
    }

    pub fn registry(&self) -> PhaseRegistry {
        self.toml.registry()
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        self.toml.controller_settings()
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_empty_file_uses_defaults() {
        let toml = AuditflowToml::parse("").unwrap();
        assert_eq!(toml, AuditflowToml::default());
        assert_eq!(toml.database.path, "auditflow.db");
        assert_eq!(toml.workflow.advance_threshold, 80);
        assert_eq!(toml.workflow.write_timeout_ms, 5000);
        assert_eq!(toml.workflow.completeness_timeout_ms, 2000);
        assert_eq!(toml.logging.level, "warn");
        assert!(!toml.logging.json);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let toml = AuditflowToml::parse(
            r#"
[database]
path = "/var/lib/audits.db"

[workflow]
advance_threshold = 90
write_timeout_ms = 1000
completeness_timeout_ms = 250

[logging]
level = "info"
json = true

[phases.labels]
follow_up = "Follow-up"
planning = "Scoping"
"#,
        )
        .unwrap();

        assert_eq!(toml.database.path, "/var/lib/audits.db");
        assert!(toml.logging.json);

        let settings = toml.controller_settings();
        assert_eq!(settings.policy.advance_threshold.value(), 90);
        assert_eq!(settings.write_timeout, Duration::from_millis(1000));
        assert_eq!(settings.completeness_timeout, Duration::from_millis(250));

        let registry = toml.registry();
        assert_eq!(registry.first().display_name, "Scoping");
        assert_eq!(registry.last().display_name, "Follow-up");
        assert_eq!(registry.phases()[1].display_name, "Execution");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = AuditflowToml::parse("[workflow]\nadvance_threshold = 70\n").unwrap();
        assert_eq!(toml.workflow.advance_threshold, 70);
        assert_eq!(toml.workflow.write_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_invalid_toml_fails() {
        assert!(AuditflowToml::parse("[workflow\nadvance_threshold = ").is_err());
        assert!(AuditflowToml::parse("[workflow]\nadvance_threshold = 300\n").is_err());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut toml = AuditflowToml::default();
        toml.workflow.advance_threshold = 0;
        toml.workflow.write_timeout_ms = 0;
        toml.phases
            .labels
            .insert("closeout".to_string(), "Close-out".to_string());

        let warnings = toml.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("advance_threshold"));
        assert!(warnings[1].contains("write_timeout_ms"));
        assert!(warnings[2].contains("closeout"));

        // Out-of-range threshold falls back to the default.
        assert_eq!(toml.controller_settings().policy, AccessPolicy::default());
    }

    #[test]
    fn test_validate_rejects_bad_threshold_above_range() {
        let mut toml = AuditflowToml::default();
        toml.workflow.advance_threshold = 101;
        assert_eq!(toml.validate().len(), 1);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut toml = AuditflowToml::default();
        toml.workflow.advance_threshold = 75;
        toml.phases
            .labels
            .insert("findings".to_string(), "Issues".to_string());
        toml.save(&path).unwrap();

        let loaded = AuditflowToml::load(&path).unwrap();
        assert_eq!(loaded, toml);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = AuditflowToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml, AuditflowToml::default());
    }

    #[test]
    fn test_db_path_layering() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let saved = std::env::var(DB_ENV).ok();
        unsafe { std::env::remove_var(DB_ENV) };

        let dir = tempdir().unwrap();
        let config = AuditflowConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            config.db_path(),
            config.config_dir.join("auditflow.db")
        );

        unsafe { std::env::set_var(DB_ENV, "/tmp/from-env.db") };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/from-env.db"));

        let config =
            AuditflowConfig::with_cli_args(dir.path().to_path_buf(), Some("cli.db".into()), false)
                .unwrap();
        assert_eq!(config.db_path(), PathBuf::from("cli.db"));

        unsafe { std::env::remove_var(DB_ENV) };
        if let Some(val) = saved {
            unsafe { std::env::set_var(DB_ENV, val) };
        }
    }

    #[test]
    fn test_log_filter_layering() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let saved_log = std::env::var(LOG_ENV).ok();
        let saved_rust = std::env::var("RUST_LOG").ok();
        unsafe {
            std::env::remove_var(LOG_ENV);
            std::env::remove_var("RUST_LOG");
        }

        let dir = tempdir().unwrap();
        let config = AuditflowConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.log_filter(), "warn");

        unsafe { std::env::set_var(LOG_ENV, "auditflow=trace") };
        assert_eq!(config.log_filter(), "auditflow=trace");

        let verbose =
            AuditflowConfig::with_cli_args(dir.path().to_path_buf(), None, true).unwrap();
        assert_eq!(verbose.log_filter(), "debug");

        unsafe { std::env::remove_var(LOG_ENV) };
        if let Some(val) = saved_log {
            unsafe { std::env::set_var(LOG_ENV, val) };
        }
        if let Some(val) = saved_rust {
            unsafe { std::env::set_var("RUST_LOG", val) };
        }
    }

    #[test]
    fn test_config_reads_file_from_auditflow_dir() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(crate::init::AUDITFLOW_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(CONFIG_FILE),
            "[database]\npath = \"custom.db\"\n",
        )
        .unwrap();

        let config = AuditflowConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.toml.database.path, "custom.db");
        assert!(config.config_file().ends_with(".auditflow/auditflow.toml"));
    }
}
