//! Phase registry for the audit-project workflow.
//!
//! This module provides:
//! - `PhaseId`, the closed set of workflow phase identifiers
//! - `Phase`, one immutable entry of the registry
//! - `PhaseRegistry`, the ordered catalog built once at process start
//!
//! The standard registry is Planning → Execution → Findings → Reporting → Follow-up.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::TransitionError;

/// Stable identifier of a workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    Planning,
    Execution,
    Findings,
    Reporting,
    FollowUp,
}

impl PhaseId {
    /// Every phase id, in workflow order.
    pub const ALL: [PhaseId; 5] = [
        PhaseId::Planning,
        PhaseId::Execution,
        PhaseId::Findings,
        PhaseId::Reporting,
        PhaseId::FollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Findings => "findings",
            Self::Reporting => "reporting",
            Self::FollowUp => "follow_up",
        }
    }

    pub fn default_display_name(&self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::Execution => "Execution",
            Self::Findings => "Findings",
            Self::Reporting => "Reporting",
            Self::FollowUp => "Follow-up",
        }
    }

    /// Key of the project's stored completeness value for this phase.
    pub fn completeness_field_key(&self) -> &'static str {
        match self {
            Self::Planning => "planning_completeness",
            Self::Execution => "execution_completeness",
            Self::Findings => "findings_completeness",
            Self::Reporting => "reporting_completeness",
            Self::FollowUp => "follow_up_completeness",
        }
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseId {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "planning" => Ok(Self::Planning),
            "execution" => Ok(Self::Execution),
            "findings" => Ok(Self::Findings),
            "reporting" => Ok(Self::Reporting),
            "follow_up" | "follow-up" | "followup" => Ok(Self::FollowUp),
            _ => Err(TransitionError::UnknownPhase { id: s.to_string() }),
        }
    }
}

/// A single step of the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    pub id: PhaseId,
    /// 0-based position in the registry
    pub ordinal: usize,
    pub display_name: String,
    pub completeness_field_key: String,
}

/// Ordered, immutable catalog of phases. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRegistry {
    phases: Vec<Phase>,
}

impl PhaseRegistry {
    /// The five-phase audit workflow.
    pub fn standard() -> Self {
        Self::build(&PhaseId::ALL)
    }

    /// Build a registry from an ordered list of phase ids.
    pub fn new(ids: &[PhaseId]) -> Result<Self> {
        if ids.is_empty() {
            bail!("A phase registry needs at least one phase");
        }
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                bail!("Phase '{}' is listed more than once", id);
            }
        }
        Ok(Self::build(ids))
    }

    fn build(ids: &[PhaseId]) -> Self {
        let phases = ids
            .iter()
            .enumerate()
            .map(|(ordinal, id)| Phase {
                id: *id,
                ordinal,
                display_name: id.default_display_name().to_string(),
                completeness_field_key: id.completeness_field_key().to_string(),
            })
            .collect();
        Self { phases }
    }

    /// Replace display names. Ids, ordering and field keys stay fixed.
    pub fn with_labels(mut self, labels: &HashMap<PhaseId, String>) -> Self {
        for phase in &mut self.phases {
            if let Some(label) = labels.get(&phase.id) {
                phase.display_name = label.clone();
            }
        }
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn contains(&self, id: PhaseId) -> bool {
        self.phases.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: PhaseId) -> Result<&Phase, TransitionError> {
        self.phases
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| TransitionError::UnknownPhase {
                id: id.as_str().to_string(),
            })
    }

    pub fn index_of(&self, id: PhaseId) -> Result<usize, TransitionError> {
        self.get(id).map(|p| p.ordinal)
    }

    pub fn phase_at(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn first(&self) -> &Phase {
        &self.phases[0]
    }

    pub fn last(&self) -> &Phase {
        &self.phases[self.phases.len() - 1]
    }

    /// The phase after `id`, or `None` when `id` is the last one.
    pub fn next_of(&self, id: PhaseId) -> Result<Option<&Phase>, TransitionError> {
        let index = self.index_of(id)?;
        Ok(self.phase_at(index + 1))
    }

    /// The phase before `id`, or `None` when `id` is the first one.
    pub fn previous_of(&self, id: PhaseId) -> Result<Option<&Phase>, TransitionError> {
        let index = self.index_of(id)?;
        Ok(index.checked_sub(1).and_then(|i| self.phase_at(i)))
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
