use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::TransitionKind;
use crate::phase::PhaseId;

/// Outcome notifications for the UI layer (toasts, re-render triggers).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Transitioned {
        project_id: i64,
        kind: TransitionKind,
        from: PhaseId,
        to: PhaseId,
        at: DateTime<Utc>,
    },
    Rejected {
        project_id: i64,
        kind: TransitionKind,
        target: Option<PhaseId>,
        message: String,
        recoverable: bool,
        /// Same request may succeed unchanged (I/O failure, busy controller)
        retryable: bool,
        at: DateTime<Utc>,
    },
}

/// Send an event to every subscriber. Dropped silently when nobody listens.
pub fn publish(tx: &broadcast::Sender<WorkflowEvent>, event: WorkflowEvent) {
    let _ = tx.send(event);
}
