//! Project initialization and audit project management commands.

use anyhow::{Context, Result};
use auditflow::config::AuditflowConfig;

use super::{open_db, print_json};

pub fn cmd_init(config: &AuditflowConfig) -> Result<()> {
    use auditflow::init::init_project;
    use auditflow::store::AuditDb;

    let result = init_project(&config.project_dir)?;

    let db_path = config.db_path();
    let db_existed = db_path.exists();
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    AuditDb::new(&db_path)?;

    if result.created {
        println!(
            "Initialized auditflow at {}",
            result.config_dir.display()
        );
        println!();
        println!("  .auditflow/");
        println!("  ├── auditflow.toml   # Configuration");
        println!("  └── auditflow.db     # Audit projects and phase state");
        println!();
        println!("Next steps:");
        println!("  1. Run `auditflow project create <name>`");
        println!("  2. Run `auditflow status -p <id>`");
    } else {
        println!(
            "auditflow already initialized at {}",
            result.config_dir.display()
        );
        if result.config_written {
            println!("Wrote default auditflow.toml.");
        }
        if !db_existed {
            println!("Created database at {}", db_path.display());
        }
    }

    Ok(())
}

pub async fn cmd_project_create(config: &AuditflowConfig, name: &str, json: bool) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        anyhow::bail!("Project name cannot be empty");
    }

    let db = open_db(config)?;
    let project = db.call(move |db| db.create_project(&name)).await?;
    tracing::info!(project_id = project.id, name = %project.name, "created audit project");

    if json {
        return print_json(&project);
    }
    println!("Created audit project {} ({})", project.id, project.name);
    Ok(())
}

pub async fn cmd_project_list(config: &AuditflowConfig, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let projects = db.call(|db| db.list_projects()).await?;

    if json {
        return print_json(&projects);
    }

    if projects.is_empty() {
        println!("No audit projects. Run 'auditflow project create <name>' to add one.");
        return Ok(());
    }

    let registry = config.registry();
    println!("{:<6} {:<30} {:<12} Updated", "ID", "Name", "Phase");
    println!(
        "{:<6} {:<30} {:<12} -------",
        "------", "------------------------------", "------------"
    );
    for project in &projects {
        let phase = registry
            .get(project.current_phase)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|_| project.current_phase.to_string());
        println!(
            "{:<6} {:<30} {:<12} {}",
            project.id, project.name, phase, project.updated_at
        );
    }
    Ok(())
}
