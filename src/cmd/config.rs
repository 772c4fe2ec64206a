//! Configuration view and validation commands: `auditflow config`.

use anyhow::{Context, Result};
use auditflow::config::{AuditflowConfig, AuditflowToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &AuditflowConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("auditflow Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No auditflow.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let toml = &config.toml;
            println!("[database]");
            println!("  path = \"{}\"", toml.database.path);
            println!();
            println!("[workflow]");
            println!(
                "  advance_threshold = {}",
                toml.workflow.advance_threshold
            );
            println!("  write_timeout_ms = {}", toml.workflow.write_timeout_ms);
            println!(
                "  completeness_timeout_ms = {}",
                toml.workflow.completeness_timeout_ms
            );
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  json = {}", toml.logging.json);
            println!();

            if !toml.phases.labels.is_empty() {
                println!("[phases.labels]");
                for (id, label) in &toml.phases.labels {
                    println!("  {} = \"{}\"", id, label);
                }
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            println!("  database = {}", config.db_path().display());
            println!("  log filter = \"{}\"", config.log_filter());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No auditflow.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("auditflow.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.config_dir).with_context(|| {
                format!("Failed to create directory: {}", config.config_dir.display())
            })?;
            AuditflowToml::default().save(&config_path)?;

            println!("Created auditflow.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [workflow] advance_threshold, write_timeout_ms");
            println!("  - [phases.labels] display names per phase id");
            println!();
        }
    }

    Ok(())
}
