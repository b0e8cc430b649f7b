//! Externally visible run status.

use crate::{GenerationStep, Recipe};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse status reported to pollers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerateStatus {
    /// Accepted, no model work yet
    Pending,
    /// Drafting or saving
    Generating,
    /// Review in progress
    Reviewing,
    /// Fix in progress
    Fixing,
    /// Recipe persisted
    Completed,
    /// Failure recorded
    Failed,
}

impl From<GenerationStep> for GenerateStatus {
    fn from(step: GenerationStep) -> Self {
        match step {
            GenerationStep::Queued | GenerationStep::Creating => GenerateStatus::Pending,
            GenerationStep::Generating | GenerationStep::Saving => GenerateStatus::Generating,
            GenerationStep::Reviewing => GenerateStatus::Reviewing,
            GenerationStep::Fixing => GenerateStatus::Fixing,
            GenerationStep::Completed => GenerateStatus::Completed,
            GenerationStep::Failed => GenerateStatus::Failed,
        }
    }
}

/// Answer to `GetStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatusReport {
    /// Queried id (a run id or a batch prefix)
    pub run_id: String,
    /// Coarse status
    pub status: GenerateStatus,
    /// Most relevant step across matching runs
    pub current_step: GenerationStep,
    /// Persisted recipes, only once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipes: Option<Vec<Recipe>>,
    /// Failure text, only once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-flight progress of one run on this worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    /// Run id
    pub run_id: String,
    /// Entity id, once the placeholder exists
    pub recipe_id: Option<Uuid>,
    /// Step the coordinator is executing
    pub current_step: GenerationStep,
    /// Last error observed
    pub error: Option<String>,
}

impl RunProgress {
    /// Progress of a run that has not started yet.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            recipe_id: None,
            current_step: GenerationStep::Queued,
            error: None,
        }
    }

    /// 1-based position of the current step, for display.
    pub fn step_number(&self) -> usize {
        self.current_step.ordinal().min(GenerationStep::ORDER.len() - 1) + 1
    }

    /// Number of steps on the success path.
    pub fn total_steps(&self) -> usize {
        GenerationStep::ORDER.len()
    }
}
