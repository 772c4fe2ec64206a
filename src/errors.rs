//! Typed error hierarchy for the audit workflow.
//!
//! Two top-level enums cover the two seams:
//! - `TransitionError`: every way a phase transition (or a query feeding one) can fail
//! - `StoreError`: failures reported by a Persistence Gateway implementation

use thiserror::Error;

use crate::completeness::Completeness;
use crate::phase::PhaseId;
use crate::workflow::TransitionKind;

/// Errors from the transition controller, the accessibility evaluator and the registry.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// A phase id that the registry does not know. Contract violation: correct
    /// UI wiring never produces it, so callers should treat it as fatal.
    #[error("Unknown phase '{id}'")]
    UnknownPhase { id: String },

    #[error("Phase {current} is the last phase")]
    NoNextPhase { current: PhaseId },

    #[error("Phase {current} is the first phase")]
    NoPreviousPhase { current: PhaseId },

    #[error("Phase {phase} is {completeness} complete, {threshold} required to advance")]
    ThresholdNotMet {
        phase: PhaseId,
        completeness: Completeness,
        threshold: Completeness,
    },

    #[error("Phase {target} is not accessible from {current}")]
    InaccessiblePhase { target: PhaseId, current: PhaseId },

    #[error("Stale {kind} request: target {requested}, expected {expected}")]
    StaleRequest {
        kind: TransitionKind,
        requested: PhaseId,
        expected: PhaseId,
    },

    #[error("Another phase transition is already in progress")]
    TransitionInProgress,

    #[error("Completeness must be between 0 and 100, got {value}")]
    InvalidCompleteness { value: i64 },

    #[error("Advance threshold must be between 1 and 100, got {value}")]
    InvalidThreshold { value: u8 },

    #[error("Failed to persist phase change: {0}")]
    Persistence(#[from] StoreError),

    #[error("Persisting phase change timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl TransitionError {
    /// Everything except a contract violation can be retried or corrected by the user.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownPhase { .. })
    }

    /// True for I/O outcomes where the write may simply be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Timeout { .. } | Self::TransitionInProgress
        )
    }

    /// Short, user-facing text for a non-fatal notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownPhase { id } => format!("Unknown phase '{}'", id),
            Self::NoNextPhase { current } => format!(
                "{} is the last phase; there is nothing to advance to",
                current.default_display_name()
            ),
            Self::NoPreviousPhase { current } => format!(
                "{} is the first phase; there is nothing to go back to",
                current.default_display_name()
            ),
            Self::ThresholdNotMet {
                phase,
                completeness,
                threshold,
            } => format!(
                "{} is {} complete; reach {} before advancing ({}% to go)",
                phase.default_display_name(),
                completeness,
                threshold,
                threshold.value().saturating_sub(completeness.value())
            ),
            Self::InaccessiblePhase { target, current } => format!(
                "{} is not accessible from {} yet",
                target.default_display_name(),
                current.default_display_name()
            ),
            Self::StaleRequest { .. } => {
                "The workflow changed since this view was loaded; refresh and retry".to_string()
            }
            Self::TransitionInProgress => "A phase change is already in progress".to_string(),
            Self::InvalidCompleteness { value } => {
                format!("Completeness must be between 0 and 100, got {}", value)
            }
            Self::InvalidThreshold { value } => {
                format!("Advance threshold must be between 1 and 100, got {}", value)
            }
            Self::Persistence(source) => {
                format!("Could not save the phase change, please retry ({})", source)
            }
            Self::Timeout { .. } => "Saving the phase change timed out, please retry".to_string(),
        }
    }
}

/// Errors from the Persistence Gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Audit project {id} not found")]
    ProjectNotFound { id: i64 },

    #[error("Corrupt row for audit project {id}: {message}")]
    CorruptRow { id: i64, message: String },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Recover a typed store error that travelled through an `anyhow` chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<StoreError>() {
            Ok(store_err) => store_err,
            Err(other) => Self::Database(other),
        }
    }
}
