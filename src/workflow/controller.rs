//! Transition controller: the only writer of a project's current-phase pointer.
//!
//! Every transition follows the same sequence:
//!
//! ```text
//! request ──> guard (boundary / threshold / accessibility)
//!         ──> PhaseStore::write_current_phase (bounded by write_timeout)
//!         ──> on success only: move the in-memory pointer, publish Transitioned
//!         ──> on any failure: pointer untouched, publish Rejected
//! ```
//!
//! Transitions are strictly sequential per controller. A request that arrives
//! while another one is awaiting its write is rejected with
//! `TransitionInProgress` rather than queued.
//!
//! If the future returned by a transition is dropped mid-write the pointer is
//! not moved, but the store may or may not have applied the write; `reload`
//! resynchronises.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::events::{WorkflowEvent, publish};
use super::{TransitionKind, TransitionRequest};
use crate::access::{self, AccessPolicy, AccessRule};
use crate::completeness::{self, Completeness, CompletenessMap, CompletenessSource};
use crate::errors::TransitionError;
use crate::phase::{Phase, PhaseId, PhaseRegistry};
use crate::store::PhaseStore;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub policy: AccessPolicy,
    /// Upper bound on a single `write_current_phase` call
    pub write_timeout: Duration,
    /// Upper bound on a single completeness poll
    pub completeness_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            policy: AccessPolicy::default(),
            write_timeout: Duration::from_secs(5),
            completeness_timeout: Duration::from_secs(2),
        }
    }
}

/// Per-phase row of a `WorkflowView`.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub completeness: Completeness,
    pub is_current: bool,
    /// The rule that makes the phase reachable, if any
    pub access: Option<AccessRule>,
}

impl PhaseStatus {
    pub fn is_accessible(&self) -> bool {
        self.access.is_some()
    }
}

/// Everything the UI needs to render the phase bar in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub project_id: i64,
    pub current: Phase,
    pub phases: Vec<PhaseStatus>,
    pub can_advance: bool,
    pub can_retreat: bool,
}

impl WorkflowView {
    pub fn accessible(&self) -> impl Iterator<Item = &Phase> {
        self.phases
            .iter()
            .filter(|s| s.is_accessible())
            .map(|s| &s.phase)
    }
}

pub struct PhaseController {
    project_id: i64,
    registry: Arc<PhaseRegistry>,
    store: Arc<dyn PhaseStore>,
    source: Arc<dyn CompletenessSource>,
    settings: ControllerSettings,
    /// Index into `registry`; only moved after a confirmed write
    current: AtomicUsize,
    transition_lock: Mutex<()>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl PhaseController {
    /// Build a controller positioned at the project's persisted phase.
    pub async fn load(
        project_id: i64,
        registry: Arc<PhaseRegistry>,
        store: Arc<dyn PhaseStore>,
        source: Arc<dyn CompletenessSource>,
        settings: ControllerSettings,
    ) -> Result<Self, TransitionError> {
        let state = store.read_project(project_id).await?;
        debug!(project_id, phase = %state.current_phase, "loaded project phase");
        Self::new(
            project_id,
            registry,
            store,
            source,
            settings,
            state.current_phase,
        )
    }

    /// Build a controller at a known phase without reading the store.
    pub fn new(
        project_id: i64,
        registry: Arc<PhaseRegistry>,
        store: Arc<dyn PhaseStore>,
        source: Arc<dyn CompletenessSource>,
        settings: ControllerSettings,
        current: PhaseId,
    ) -> Result<Self, TransitionError> {
        let index = registry.index_of(current)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            project_id,
            registry,
            store,
            source,
            settings,
            current: AtomicUsize::new(index),
            transition_lock: Mutex::new(()),
            events,
        })
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn current_phase(&self) -> &Phase {
        &self.registry.phases()[self.current.load(Ordering::Acquire)]
    }

    /// Poll one phase's completeness. Unavailable reads as 0.
    pub async fn completeness_of(&self, phase: PhaseId) -> Result<Completeness, TransitionError> {
        self.registry.get(phase)?;
        Ok(self.poll(phase).await)
    }

    /// Poll every registered phase.
    pub async fn completeness(&self) -> CompletenessMap {
        let ids: Vec<PhaseId> = self.registry.phases().iter().map(|p| p.id).collect();
        self.poll_many(ids).await
    }

    pub async fn accessible_phases(&self) -> Result<Vec<Phase>, TransitionError> {
        let current = self.current_phase().id;
        let completeness = self.completeness().await;
        let phases =
            access::accessible_phases(&self.registry, &self.settings.policy, current, &completeness)?;
        Ok(phases.into_iter().cloned().collect())
    }

    pub async fn view(&self) -> Result<WorkflowView, TransitionError> {
        let current = self.current_phase().clone();
        let completeness = self.completeness().await;
        let policy = &self.settings.policy;

        let mut phases = Vec::with_capacity(self.registry.len());
        for phase in self.registry.phases() {
            let access =
                access::evaluate(&self.registry, policy, phase.id, current.id, &completeness)?;
            phases.push(PhaseStatus {
                phase: phase.clone(),
                completeness: completeness.get(phase.id),
                is_current: phase.id == current.id,
                access,
            });
        }

        let can_advance = self.registry.next_of(current.id)?.is_some()
            && policy.permits_advance(completeness.get(current.id));
        let can_retreat = current.ordinal > 0;

        Ok(WorkflowView {
            project_id: self.project_id,
            current,
            phases,
            can_advance,
            can_retreat,
        })
    }

    /// Move to the next phase. Requires the current phase to meet the advance threshold.
    pub async fn advance(&self) -> Result<Phase, TransitionError> {
        self.transition(TransitionKind::Advance, None).await
    }

    /// Move to the previous phase. Never threshold-gated.
    pub async fn retreat(&self) -> Result<Phase, TransitionError> {
        self.transition(TransitionKind::Retreat, None).await
    }

    /// Jump straight to `target` if the accessibility rules allow it.
    pub async fn jump_to(&self, target: PhaseId) -> Result<Phase, TransitionError> {
        self.apply(TransitionRequest::direct(target)).await
    }

    /// Apply an explicit request. Requesting the phase that is already current
    /// succeeds without writing.
    pub async fn apply(&self, request: TransitionRequest) -> Result<Phase, TransitionError> {
        self.transition(request.kind, Some(request.target)).await
    }

    /// Re-read the persisted pointer. Another client may have moved it.
    pub async fn reload(&self) -> Result<Phase, TransitionError> {
        // Never swap the pointer under an in-flight write.
        let _guard = self
            .transition_lock
            .try_lock()
            .map_err(|_| TransitionError::TransitionInProgress)?;
        let state = self.store.read_project(self.project_id).await?;
        let index = self.registry.index_of(state.current_phase)?;
        let previous = self.current.swap(index, Ordering::AcqRel);
        if previous != index {
            info!(
                project_id = self.project_id,
                phase = %state.current_phase,
                "current phase changed by another writer"
            );
        }
        Ok(self.registry.phases()[index].clone())
    }

    async fn transition(
        &self,
        kind: TransitionKind,
        requested: Option<PhaseId>,
    ) -> Result<Phase, TransitionError> {
        let result = self.guarded_transition(kind, requested).await;
        if let Err(e) = &result {
            warn!(
                project_id = self.project_id,
                kind = %kind,
                target = ?requested,
                error = %e,
                "phase transition rejected"
            );
            publish(
                &self.events,
                WorkflowEvent::Rejected {
                    project_id: self.project_id,
                    kind,
                    target: requested,
                    message: e.user_message(),
                    recoverable: e.is_recoverable(),
                    retryable: e.is_retryable(),
                    at: Utc::now(),
                },
            );
        }
        result
    }

    async fn guarded_transition(
        &self,
        kind: TransitionKind,
        requested: Option<PhaseId>,
    ) -> Result<Phase, TransitionError> {
        // try_lock, not lock: a concurrent request is rejected, never queued.
        let _guard = self
            .transition_lock
            .try_lock()
            .map_err(|_| TransitionError::TransitionInProgress)?;

        // Unknown ids are rejected before anything else is looked at.
        if let Some(target) = requested {
            self.registry.get(target)?;
        }

        let current = self.current_phase().clone();
        if requested == Some(current.id) {
            debug!(project_id = self.project_id, phase = %current.id, "already current, nothing to do");
            return Ok(current);
        }

        let target = match kind {
            TransitionKind::Advance => {
                let next = self
                    .registry
                    .next_of(current.id)?
                    .ok_or(TransitionError::NoNextPhase {
                        current: current.id,
                    })?
                    .clone();
                check_adjacent(kind, requested, &next)?;
                // Fresh read; the editor may have changed since the last view.
                let completeness = self.poll(current.id).await;
                if !self.settings.policy.permits_advance(completeness) {
                    return Err(TransitionError::ThresholdNotMet {
                        phase: current.id,
                        completeness,
                        threshold: self.settings.policy.advance_threshold,
                    });
                }
                next
            }
            TransitionKind::Retreat => {
                let previous = self
                    .registry
                    .previous_of(current.id)?
                    .ok_or(TransitionError::NoPreviousPhase {
                        current: current.id,
                    })?
                    .clone();
                check_adjacent(kind, requested, &previous)?;
                // Going back is never gated.
                previous
            }
            TransitionKind::Direct => {
                let target = self.registry.get(requested.unwrap_or(current.id))?.clone();
                // The rules only ever look at these two phases.
                let completeness = self.poll_many([current.id, target.id]).await;
                let accessible = access::is_accessible(
                    &self.registry,
                    &self.settings.policy,
                    target.id,
                    current.id,
                    &completeness,
                )?;
                if !accessible {
                    return Err(TransitionError::InaccessiblePhase {
                        target: target.id,
                        current: current.id,
                    });
                }
                target
            }
        };

        if target.id == current.id {
            return Ok(current);
        }

        // Write first. On any failure the in-memory pointer stays put.
        self.persist(target.id).await?;
        self.current.store(target.ordinal, Ordering::Release);

        info!(
            project_id = self.project_id,
            kind = %kind,
            from = %current.id,
            to = %target.id,
            "phase transition committed"
        );
        publish(
            &self.events,
            WorkflowEvent::Transitioned {
                project_id: self.project_id,
                kind,
                from: current.id,
                to: target.id,
                at: Utc::now(),
            },
        );
        Ok(target)
    }

    async fn persist(&self, phase: PhaseId) -> Result<(), TransitionError> {
        let write = self.store.write_current_phase(self.project_id, phase);
        // A timed-out write may still land later; reload() picks that up.
        match tokio::time::timeout(self.settings.write_timeout, write).await {
            Ok(result) => result.map_err(TransitionError::Persistence),
            Err(_) => Err(TransitionError::Timeout {
                after_ms: u64::try_from(self.settings.write_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            }),
        }
    }

    async fn poll(&self, phase: PhaseId) -> Completeness {
        completeness::poll_completeness(
            self.source.as_ref(),
            phase,
            self.settings.completeness_timeout,
        )
        .await
    }

    async fn poll_many(&self, phases: impl IntoIterator<Item = PhaseId>) -> CompletenessMap {
        completeness::poll_many(
            self.source.as_ref(),
            phases,
            self.settings.completeness_timeout,
        )
        .await
    }
}

/// An explicit advance/retreat target must be the adjacent phase.
fn check_adjacent(
    kind: TransitionKind,
    requested: Option<PhaseId>,
    expected: &Phase,
) -> Result<(), TransitionError> {
    match requested {
        Some(target) if target != expected.id => Err(TransitionError::StaleRequest {
            kind,
            requested: target,
            expected: expected.id,
        }),
        _ => Ok(()),
    }
}
