use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use auditflow::config::AuditflowConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "auditflow")]
#[command(version, about = "Phase workflow for audit projects")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Database path. Overrides AUDITFLOW_DB and auditflow.toml.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .auditflow/ with a default config and database
    Init,
    /// Create or list audit projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// List the workflow phases in order
    Phases,
    /// Show a project's current phase, completeness and accessible phases
    Status {
        #[arg(short, long)]
        project: i64,
    },
    /// Move a project to the next phase
    Advance {
        #[arg(short, long)]
        project: i64,
        /// Only advance if this is the phase it would land on
        #[arg(long)]
        to: Option<String>,
    },
    /// Move a project back to the previous phase
    Retreat {
        #[arg(short, long)]
        project: i64,
        /// Only retreat if this is the phase it would land on
        #[arg(long)]
        to: Option<String>,
    },
    /// Jump a project directly to an accessible phase
    Jump {
        #[arg(short, long)]
        project: i64,
        /// Target phase id (planning, execution, findings, reporting, follow_up)
        phase: String,
    },
    /// Record phase completeness, as a phase editor would
    Completeness {
        #[command(subcommand)]
        command: CompletenessCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectCommands {
    /// Create a new audit project in the planning phase
    Create { name: String },
    /// List audit projects
    List,
}

#[derive(Subcommand, Clone)]
pub enum CompletenessCommands {
    /// Set a phase's completeness (0-100)
    Set {
        #[arg(short, long)]
        project: i64,
        phase: String,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default auditflow.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = AuditflowConfig::with_cli_args(project_dir, cli.db.clone(), cli.verbose)?;
    auditflow::logging::init_tracing(&config.log_filter(), config.log_json())?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Project { command } => match command {
            ProjectCommands::Create { name } => {
                cmd::cmd_project_create(&config, name, cli.json).await?
            }
            ProjectCommands::List => cmd::cmd_project_list(&config, cli.json).await?,
        },
        Commands::Phases => cmd::cmd_phases(&config, cli.json)?,
        Commands::Status { project } => cmd::cmd_status(&config, *project, cli.json).await?,
        Commands::Advance { project, to } => {
            cmd::cmd_advance(&config, *project, to.as_deref(), cli.json).await?
        }
        Commands::Retreat { project, to } => {
            cmd::cmd_retreat(&config, *project, to.as_deref(), cli.json).await?
        }
        Commands::Jump { project, phase } => {
            cmd::cmd_jump(&config, *project, phase, cli.json).await?
        }
        Commands::Completeness { command } => match command {
            CompletenessCommands::Set {
                project,
                phase,
                value,
            } => cmd::cmd_completeness_set(&config, *project, phase, *value, cli.json).await?,
        },
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
