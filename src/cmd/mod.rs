//! CLI command implementations.
//!
//! | Module    | Commands handled                                        |
//! |-----------|---------------------------------------------------------|
//! | `project` | `Init`, `Project`                                       |
//! | `phase`   | `Phases`, `Status`, `Advance`, `Retreat`, `Jump`, `Completeness` |
//! | `config`  | `Config`                                                |

pub mod config;
pub mod phase;
pub mod project;

pub use config::cmd_config;
pub use phase::{
    cmd_advance, cmd_completeness_set, cmd_jump, cmd_phases, cmd_retreat, cmd_status,
};
pub use project::{cmd_init, cmd_project_create, cmd_project_list};

use anyhow::{Result, bail};
use std::sync::Arc;

use auditflow::completeness::StoredCompleteness;
use auditflow::config::AuditflowConfig;
use auditflow::errors::TransitionError;
use auditflow::init::is_initialized;
use auditflow::store::{AuditDb, DbHandle, PhaseStore};
use auditflow::workflow::PhaseController;

/// Open the configured database. Only `init` may create it.
pub(crate) fn open_db(config: &AuditflowConfig) -> Result<DbHandle> {
    let path = config.db_path();
    if path.exists() {
        return Ok(DbHandle::new(AuditDb::new(&path)?));
    }
    // --db / AUDITFLOW_DB may point outside .auditflow, so check both.
    if !is_initialized(&config.project_dir) {
        bail!(
            "auditflow is not initialized in {}. Run 'auditflow init' first.",
            config.project_dir.display()
        );
    }
    bail!(
        "No database at {}. Run 'auditflow init' first.",
        path.display()
    )
}

/// Build a controller positioned at the project's persisted phase.
pub(crate) async fn load_controller(
    config: &AuditflowConfig,
    project_id: i64,
) -> Result<PhaseController> {
    let store: Arc<dyn PhaseStore> = Arc::new(open_db(config)?);
    let source = Arc::new(StoredCompleteness::new(store.clone(), project_id));
    PhaseController::load(
        project_id,
        Arc::new(config.registry()),
        store,
        source,
        config.controller_settings(),
    )
    .await
    .map_err(fatal)
}

/// Surface a failure to the user. Store errors keep their own wording.
pub(crate) fn fatal(err: TransitionError) -> anyhow::Error {
    match err {
        TransitionError::Persistence(source) => anyhow::Error::new(source),
        other => anyhow::anyhow!("{}", other.user_message()),
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
