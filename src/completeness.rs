//! Completeness scores and the sources they are read from.
//!
//! Each phase's content editor owns its completeness. The workflow core only
//! reads it, polling a `CompletenessSource` at every decision point. A source
//! that errors, times out or has nothing registered for a phase reads as 0 so
//! the machine stays conservative.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TransitionError;
use crate::phase::PhaseId;
use crate::store::PhaseStore;

/// A completeness percentage in 0..=100.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Completeness(u8);

impl Completeness {
    pub const ZERO: Completeness = Completeness(0);
    pub const FULL: Completeness = Completeness(100);

    pub fn new(value: u8) -> Result<Self, TransitionError> {
        if value > 100 {
            return Err(TransitionError::InvalidCompleteness {
                value: i64::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Clamp any integer into range. Used for values read from foreign rows.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_full(self) -> bool {
        self == Self::FULL
    }
}

impl TryFrom<u8> for Completeness {
    type Error = TransitionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Completeness> for u8 {
    fn from(c: Completeness) -> u8 {
        c.0
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Completeness for every phase. A phase with no entry reads as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletenessMap(BTreeMap<PhaseId, Completeness>);

impl CompletenessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, phase: PhaseId) -> Completeness {
        self.0.get(&phase).copied().unwrap_or_default()
    }

    pub fn set(&mut self, phase: PhaseId, value: Completeness) {
        self.0.insert(phase, value);
    }

    /// Builder-style `set`, handy in tests and fixtures.
    pub fn with(mut self, phase: PhaseId, value: Completeness) -> Self {
        self.set(phase, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhaseId, Completeness)> + '_ {
        self.0.iter().map(|(id, c)| (*id, *c))
    }
}

impl FromIterator<(PhaseId, Completeness)> for CompletenessMap {
    fn from_iter<I: IntoIterator<Item = (PhaseId, Completeness)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where the controller reads per-phase completeness from.
#[async_trait]
pub trait CompletenessSource: Send + Sync {
    async fn completeness(&self, phase: PhaseId) -> Result<Completeness>;

    /// Read several phases in one go. Failures read as 0, like a single poll.
    ///
    /// The default polls each phase in turn, each under its own `timeout`.
    /// Sources that can answer for every phase from one read should override it.
    async fn completeness_map(&self, phases: &[PhaseId], timeout: Duration) -> CompletenessMap {
        let mut map = CompletenessMap::new();
        for &phase in phases {
            let value = match within(timeout, self.completeness(phase)).await {
                Ok(value) => value,
                Err(e) => unavailable(phase, &e),
            };
            map.set(phase, value);
        }
        map
    }
}

/// A phase content editor. Each one computes the completeness of its own phase.
#[async_trait]
pub trait PhaseEditor: Send + Sync {
    async fn completeness(&self) -> Result<Completeness>;
}

/// Reads the value editors have persisted through the gateway.
pub struct StoredCompleteness {
    store: Arc<dyn PhaseStore>,
    project_id: i64,
}

impl StoredCompleteness {
    pub fn new(store: Arc<dyn PhaseStore>, project_id: i64) -> Self {
        Self { store, project_id }
    }
}

#[async_trait]
impl CompletenessSource for StoredCompleteness {
    async fn completeness(&self, phase: PhaseId) -> Result<Completeness> {
        let state = self.store.read_project(self.project_id).await?;
        Ok(state.completeness.get(phase))
    }

    // Every phase lives on the same project row: one read answers them all.
    async fn completeness_map(&self, phases: &[PhaseId], timeout: Duration) -> CompletenessMap {
        match within(timeout, self.store.read_project(self.project_id)).await {
            Ok(state) => phases
                .iter()
                .map(|&phase| (phase, state.completeness.get(phase)))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    project_id = self.project_id,
                    error = %e,
                    "completeness unavailable, treating every phase as 0"
                );
                phases.iter().map(|&phase| (phase, Completeness::ZERO)).collect()
            }
        }
    }
}

/// One live editor per phase.
#[derive(Clone, Default)]
pub struct EditorSet {
    editors: HashMap<PhaseId, Arc<dyn PhaseEditor>>,
}

impl EditorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_editor(mut self, phase: PhaseId, editor: Arc<dyn PhaseEditor>) -> Self {
        self.register(phase, editor);
        self
    }

    pub fn register(&mut self, phase: PhaseId, editor: Arc<dyn PhaseEditor>) {
        self.editors.insert(phase, editor);
    }
}

#[async_trait]
impl CompletenessSource for EditorSet {
    async fn completeness(&self, phase: PhaseId) -> Result<Completeness> {
        match self.editors.get(&phase) {
            Some(editor) => editor.completeness().await,
            None => bail!("No content editor registered for phase {}", phase),
        }
    }
}

/// Run `read` under `timeout`, folding an elapsed timer into the error.
async fn within<T, E>(timeout: Duration, read: impl Future<Output = Result<T, E>>) -> Result<T>
where
    anyhow::Error: From<E>,
{
    match tokio::time::timeout(timeout, read).await {
        Ok(result) => Ok(result?),
        Err(_) => bail!("timed out after {}ms", timeout.as_millis()),
    }
}

fn unavailable(phase: PhaseId, error: &anyhow::Error) -> Completeness {
    tracing::warn!(phase = %phase, error = %error, "completeness unavailable, treating as 0");
    Completeness::ZERO
}

/// Poll one phase. Errors and timeouts read as 0.
pub async fn poll_completeness(
    source: &dyn CompletenessSource,
    phase: PhaseId,
    timeout: Duration,
) -> Completeness {
    match within(timeout, source.completeness(phase)).await {
        Ok(value) => value,
        Err(e) => unavailable(phase, &e),
    }
}

/// Poll several phases into a map.
pub async fn poll_many(
    source: &dyn CompletenessSource,
    phases: impl IntoIterator<Item = PhaseId>,
    timeout: Duration,
) -> CompletenessMap {
    let phases: Vec<PhaseId> = phases.into_iter().collect();
    source.completeness_map(&phases, timeout).await
}
