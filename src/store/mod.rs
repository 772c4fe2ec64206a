//! Persistence Gateway: the durable home of each project's phase pointer and
//! completeness values.
//!
//! ## Module Map
//!
//! | Module   | Responsibility                                               |
//! |----------|--------------------------------------------------------------|
//! | `models` | `AuditProject` row type                                      |
//! | `db`     | SQLite access via `DbHandle` (thin `Arc<Mutex<AuditDb>>`)    |
//! | `memory` | `MemoryStore`, an in-process gateway                         |
//!
//! The stored record is shared by every client viewing the same project.
//! There is no locking or version token: the last successful write wins.

pub mod db;
pub mod memory;
pub mod models;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completeness::{Completeness, CompletenessMap};
use crate::errors::StoreError;
use crate::phase::PhaseId;

pub use db::{AuditDb, DbHandle};
pub use memory::MemoryStore;
pub use models::AuditProject;

/// The slice of an audit project the workflow core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project_id: i64,
    pub current_phase: PhaseId,
    pub completeness: CompletenessMap,
}

impl ProjectState {
    /// A fresh project: first phase, nothing done yet.
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            current_phase: PhaseId::Planning,
            completeness: CompletenessMap::new(),
        }
    }
}

/// Abstraction over project persistence. Real implementation: `DbHandle`.
#[async_trait]
pub trait PhaseStore: Send + Sync {
    async fn read_project(&self, project_id: i64) -> Result<ProjectState, StoreError>;

    async fn write_current_phase(&self, project_id: i64, phase: PhaseId) -> Result<(), StoreError>;

    /// Called by phase content editors, never by the transition controller.
    async fn write_completeness(
        &self,
        project_id: i64,
        phase: PhaseId,
        value: Completeness,
    ) -> Result<(), StoreError>;
}
