use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, params};

use super::models::AuditProject;
use super::{PhaseStore, ProjectState};
use crate::completeness::{Completeness, CompletenessMap};
use crate::errors::StoreError;
use crate::phase::PhaseId;

/// Async-safe handle to the audit database.
///
/// Wraps `AuditDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<AuditDb>>,
}

impl DbHandle {
    pub fn new(db: AuditDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&AuditDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct AuditDb {
    conn: Connection,
}

impl AuditDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // Per connection; SQLite defaults it to off.
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        // Re-run on every open. Phases are stored by id string, never by ordinal.
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS audit_projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    current_phase TEXT NOT NULL DEFAULT 'planning',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS phase_completeness (
                    project_id INTEGER NOT NULL REFERENCES audit_projects(id) ON DELETE CASCADE,
                    phase TEXT NOT NULL,
                    value INTEGER NOT NULL DEFAULT 0 CHECK (value BETWEEN 0 AND 100),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (project_id, phase)
                );
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Project CRUD ──────────────────────────────────────────────────

    pub fn create_project(&self, name: &str) -> Result<AuditProject> {
        self.conn
            .execute(
                "INSERT INTO audit_projects (name, current_phase) VALUES (?1, ?2)",
                params![name, PhaseId::Planning.as_str()],
            )
            .context("Failed to insert audit project")?;
        // Read back for the defaulted timestamps.
        let id = self.conn.last_insert_rowid();
        self.get_project(id)?
            .context("Audit project not found after insert")
    }

    pub fn list_projects(&self) -> Result<Vec<AuditProject>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, current_phase, created_at, updated_at
                 FROM audit_projects ORDER BY id",
            )
            .context("Failed to prepare list_projects")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProjectRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    current_phase: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })
            .context("Failed to query audit projects")?;
        let mut projects = Vec::new();
        for row in rows {
            let r = row.context("Failed to read audit project row")?;
            projects.push(r.into_project()?);
        }
        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<AuditProject>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, current_phase, created_at, updated_at
                 FROM audit_projects WHERE id = ?1",
            )
            .context("Failed to prepare get_project")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(ProjectRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    current_phase: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })
            .context("Failed to query audit project")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read audit project row")?;
                Ok(Some(r.into_project()?))
            }
            None => Ok(None),
        }
    }

    // ── Phase state ───────────────────────────────────────────────────

    /// Completeness rows for a project. Phases without a row read as 0.
    pub fn get_completeness(&self, project_id: i64) -> Result<CompletenessMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT phase, value FROM phase_completeness WHERE project_id = ?1")
            .context("Failed to prepare get_completeness")?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .context("Failed to query phase completeness")?;
        let mut map = CompletenessMap::new();
        for row in rows {
            let (phase, value) = row.context("Failed to read phase completeness row")?;
            // The CHECK constraint bounds value, but files written by other
            // tools may predate it.
            match phase.parse::<PhaseId>() {
                Ok(id) => map.set(id, Completeness::saturating(value)),
                Err(_) => {
                    tracing::warn!(project_id, phase = %phase, "ignoring completeness row for unknown phase")
                }
            }
        }
        Ok(map)
    }

    pub fn get_project_state(&self, project_id: i64) -> Result<Option<ProjectState>> {
        let project = match self.get_project(project_id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let completeness = self.get_completeness(project_id)?;
        Ok(Some(ProjectState {
            project_id,
            current_phase: project.current_phase,
            completeness,
        }))
    }

    /// Returns false when no such project exists.
    pub fn update_current_phase(&self, project_id: i64, phase: PhaseId) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE audit_projects SET current_phase = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![phase.as_str(), project_id],
            )
            .context("Failed to update current phase")?;
        Ok(count > 0)
    }

    /// Upsert a completeness value. Returns false when no such project exists.
    pub fn set_completeness(
        &self,
        project_id: i64,
        phase: PhaseId,
        value: Completeness,
    ) -> Result<bool> {
        // Checked up front so a missing project maps to ProjectNotFound.
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM audit_projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .context("Failed to check audit project")?;
        if !exists {
            return Ok(false);
        }

        self.conn
            .execute(
                "INSERT INTO phase_completeness (project_id, phase, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(project_id, phase)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![project_id, phase.as_str(), value.value()],
            )
            .context("Failed to write phase completeness")?;
        Ok(true)
    }
}

#[async_trait]
impl PhaseStore for DbHandle {
    async fn read_project(&self, project_id: i64) -> Result<ProjectState, StoreError> {
        // from_anyhow keeps CorruptRow typed through the anyhow chain.
        self.call(move |db| db.get_project_state(project_id))
            .await
            .map_err(StoreError::from_anyhow)?
            .ok_or(StoreError::ProjectNotFound { id: project_id })
    }

    async fn write_current_phase(&self, project_id: i64, phase: PhaseId) -> Result<(), StoreError> {
        let updated = self
            .call(move |db| db.update_current_phase(project_id, phase))
            .await
            .map_err(StoreError::from_anyhow)?;
        if !updated {
            return Err(StoreError::ProjectNotFound { id: project_id });
        }
        Ok(())
    }

    async fn write_completeness(
        &self,
        project_id: i64,
        phase: PhaseId,
        value: Completeness,
    ) -> Result<(), StoreError> {
        let written = self
            .call(move |db| db.set_completeness(project_id, phase, value))
            .await
            .map_err(StoreError::from_anyhow)?;
        if !written {
            return Err(StoreError::ProjectNotFound { id: project_id });
        }
        Ok(())
    }
}

// ── Row types ─────────────────────────────────────────────────────────

struct ProjectRow {
    id: i64,
    name: String,
    current_phase: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn into_project(self) -> Result<AuditProject> {
        // An unknown pointer is corruption, not a default to planning.
        let current_phase = self
            .current_phase
            .parse::<PhaseId>()
            .map_err(|_| StoreError::CorruptRow {
                id: self.id,
                message: format!("unknown current_phase '{}'", self.current_phase),
            })?;
        Ok(AuditProject {
            id: self.id,
            name: self.name,
            current_phase,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
