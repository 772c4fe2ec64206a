//! Accessibility evaluation: which phases a user may jump to directly.
//!
//! Rules, first match wins:
//!
//! | Rule           | Grants access when                                          |
//! |----------------|-------------------------------------------------------------|
//! | `FirstPhase`   | target is ordinal 0                                         |
//! | `Reached`      | ordinal(target) <= ordinal(current)                         |
//! | `NextUnlocked` | ordinal(target) == ordinal(current) + 1 and the current phase meets the advance threshold |
//! | `Completed`    | the target's own completeness is 100, whatever its ordinal  |
//!
//! Everything here is pure: identical inputs give identical answers.

use serde::{Deserialize, Serialize};

use crate::completeness::{Completeness, CompletenessMap};
use crate::errors::TransitionError;
use crate::phase::{Phase, PhaseId, PhaseRegistry};

/// Minimum completeness of the current phase before moving forward.
pub const DEFAULT_ADVANCE_THRESHOLD: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub advance_threshold: Completeness,
}

impl AccessPolicy {
    /// Thresholds must lie in 1..=100.
    pub fn new(advance_threshold: u8) -> Result<Self, TransitionError> {
        if advance_threshold == 0 || advance_threshold > 100 {
            return Err(TransitionError::InvalidThreshold {
                value: advance_threshold,
            });
        }
        Ok(Self {
            advance_threshold: Completeness::new(advance_threshold)?,
        })
    }

    pub fn permits_advance(&self, current: Completeness) -> bool {
        current >= self.advance_threshold
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            advance_threshold: Completeness::saturating(i64::from(DEFAULT_ADVANCE_THRESHOLD)),
        }
    }
}

/// The rule that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRule {
    FirstPhase,
    Reached,
    NextUnlocked,
    Completed,
}

/// Return the first rule that grants access to `target`, or `None`.
pub fn evaluate(
    registry: &PhaseRegistry,
    policy: &AccessPolicy,
    target: PhaseId,
    current: PhaseId,
    completeness: &CompletenessMap,
) -> Result<Option<AccessRule>, TransitionError> {
    let target_index = registry.index_of(target)?;
    let current_index = registry.index_of(current)?;

    if target_index == 0 {
        return Ok(Some(AccessRule::FirstPhase));
    }
    if target_index <= current_index {
        return Ok(Some(AccessRule::Reached));
    }
    if target_index == current_index + 1 && policy.permits_advance(completeness.get(current)) {
        return Ok(Some(AccessRule::NextUnlocked));
    }
    if completeness.get(target).is_full() {
        return Ok(Some(AccessRule::Completed));
    }
    Ok(None)
}

pub fn is_accessible(
    registry: &PhaseRegistry,
    policy: &AccessPolicy,
    target: PhaseId,
    current: PhaseId,
    completeness: &CompletenessMap,
) -> Result<bool, TransitionError> {
    Ok(evaluate(registry, policy, target, current, completeness)?.is_some())
}

/// Every accessible phase, in ordinal order.
pub fn accessible_phases<'a>(
    registry: &'a PhaseRegistry,
    policy: &AccessPolicy,
    current: PhaseId,
    completeness: &CompletenessMap,
) -> Result<Vec<&'a Phase>, TransitionError> {
    let mut accessible = Vec::new();
    for phase in registry.phases() {
        if is_accessible(registry, policy, phase.id, current, completeness)? {
            accessible.push(phase);
        }
    }
    Ok(accessible)
}
