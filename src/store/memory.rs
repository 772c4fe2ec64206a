use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{PhaseStore, ProjectState};
use crate::completeness::Completeness;
use crate::errors::StoreError;
use crate::phase::PhaseId;

/// Gateway backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: Mutex<HashMap<i64, ProjectState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a project record.
    pub fn insert(&self, state: ProjectState) {
        let mut projects = match self.projects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        projects.insert(state.project_id, state);
    }

    fn with_project<R>(
        &self,
        project_id: i64,
        f: impl FnOnce(&mut ProjectState) -> R,
    ) -> Result<R, StoreError> {
        let mut projects = self.projects.lock().map_err(|_| StoreError::LockPoisoned)?;
        let state = projects
            .get_mut(&project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;
        Ok(f(state))
    }
}

#[async_trait]
impl PhaseStore for MemoryStore {
    async fn read_project(&self, project_id: i64) -> Result<ProjectState, StoreError> {
        self.with_project(project_id, |state| state.clone())
    }

    async fn write_current_phase(&self, project_id: i64, phase: PhaseId) -> Result<(), StoreError> {
        self.with_project(project_id, |state| state.current_phase = phase)
    }

    async fn write_completeness(
        &self,
        project_id: i64,
        phase: PhaseId,
        value: Completeness,
    ) -> Result<(), StoreError> {
        self.with_project(project_id, |state| state.completeness.set(phase, value))
    }
}
