use serde::{Deserialize, Serialize};

use crate::phase::PhaseId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditProject {
    pub id: i64,
    pub name: String,
    pub current_phase: PhaseId,
    pub created_at: String,
    pub updated_at: String,
}
