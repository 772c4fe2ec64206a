use serde::{Deserialize, Serialize};

use crate::phase::PhaseId;

/// How a transition was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Advance,
    Retreat,
    Direct,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Retreat => "retreat",
            Self::Direct => "direct",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user action. Consumed immediately, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target: PhaseId,
    pub kind: TransitionKind,
}

impl TransitionRequest {
    pub fn advance_to(target: PhaseId) -> Self {
        Self {
            target,
            kind: TransitionKind::Advance,
        }
    }

    pub fn retreat_to(target: PhaseId) -> Self {
        Self {
            target,
            kind: TransitionKind::Retreat,
        }
    }

    pub fn direct(target: PhaseId) -> Self {
        Self {
            target,
            kind: TransitionKind::Direct,
        }
    }
}
