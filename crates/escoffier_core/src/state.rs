//! Run state persisted on the recipe entity.
//!
//! Step and status are closed enums with exhaustive transition rules. A run
//! only ever moves forward through [`GenerationStep::ORDER`] except for the
//! single jump into [`GenerationStep::Failed`], and nothing leaves a
//! terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline step a run is currently in.
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
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GenerationStep {
    /// Accepted, nothing executed yet
    Queued,
    /// Creating the placeholder entity
    Creating,
    /// Drafting the recipe with the model
    Generating,
    /// Critiquing the draft
    Reviewing,
    /// Repairing reported issues
    Fixing,
    /// Persisting the final recipe
    Saving,
    /// Finished successfully
    Completed,
    /// Finished with a recorded failure
    Failed,
}

impl GenerationStep {
    /// The forward sequence every successful run walks.
    pub const ORDER: [GenerationStep; 7] = [
        GenerationStep::Queued,
        GenerationStep::Creating,
        GenerationStep::Generating,
        GenerationStep::Reviewing,
        GenerationStep::Fixing,
        GenerationStep::Saving,
        GenerationStep::Completed,
    ];

    /// Position in [`Self::ORDER`]. `Failed` sorts after everything.
    pub fn ordinal(self) -> usize {
        match self {
            GenerationStep::Queued => 0,
            GenerationStep::Creating => 1,
            GenerationStep::Generating => 2,
            GenerationStep::Reviewing => 3,
            GenerationStep::Fixing => 4,
            GenerationStep::Saving => 5,
            GenerationStep::Completed => 6,
            GenerationStep::Failed => 7,
        }
    }

    /// The step that follows this one on the success path.
    pub fn next(self) -> Option<GenerationStep> {
        match self {
            GenerationStep::Queued => Some(GenerationStep::Creating),
            GenerationStep::Creating => Some(GenerationStep::Generating),
            GenerationStep::Generating => Some(GenerationStep::Reviewing),
            GenerationStep::Reviewing => Some(GenerationStep::Fixing),
            GenerationStep::Fixing => Some(GenerationStep::Saving),
            GenerationStep::Saving => Some(GenerationStep::Completed),
            GenerationStep::Completed | GenerationStep::Failed => None,
        }
    }

    /// Whether the run has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStep::Completed | GenerationStep::Failed)
    }

    /// Whether a run sitting at `self` may be moved to `to`.
    ///
    /// Staying put is allowed so repeated writes after a restart are
    /// harmless; skipping ahead is allowed because not every step persists
    /// its own marker.
    pub fn can_transition_to(self, to: GenerationStep) -> bool {
        match (self, to) {
            (GenerationStep::Completed | GenerationStep::Failed, _) => false,
            (_, GenerationStep::Failed) => true,
            (from, to) => to.ordinal() >= from.ordinal(),
        }
    }
}

/// Lifecycle status of a run.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GenerationStatus {
    /// Created, no model work started
    Pending,
    /// Model work under way
    InProgress,
    /// Recipe persisted
    Completed,
    /// Failure recorded
    Failed,
}

impl GenerationStatus {
    fn rank(self) -> u8 {
        match self {
            GenerationStatus::Pending => 0,
            GenerationStatus::InProgress => 1,
            GenerationStatus::Completed | GenerationStatus::Failed => 2,
        }
    }

    /// Whether the run has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Same forward-only rule as [`GenerationStep::can_transition_to`].
    pub fn can_transition_to(self, to: GenerationStatus) -> bool {
        match (self, to) {
            (GenerationStatus::Completed | GenerationStatus::Failed, _) => false,
            (_, GenerationStatus::Failed) => true,
            (from, to) => to.rank() >= from.rank(),
        }
    }
}

/// Partial update of a run's state, the `UpdateGenerationState` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStateUpdate {
    /// New step, if changing
    pub step: Option<GenerationStep>,
    /// New status, if changing
    pub status: Option<GenerationStatus>,
    /// Error text to record
    pub error: Option<String>,
    /// Step at which the run failed
    pub failed_step: Option<GenerationStep>,
}

impl GenerationStateUpdate {
    /// Move to `step` without touching the status.
    pub fn step(step: GenerationStep) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    /// Move to `step` and `status` together.
    pub fn step_and_status(step: GenerationStep, status: GenerationStatus) -> Self {
        Self {
            step: Some(step),
            status: Some(status),
            ..Default::default()
        }
    }

    /// Record a failure that happened while at `failed_step`.
    pub fn failed(failed_step: GenerationStep, error: impl Into<String>) -> Self {
        Self {
            step: Some(GenerationStep::Failed),
            status: Some(GenerationStatus::Failed),
            error: Some(error.into()),
            failed_step: Some(failed_step),
        }
    }
}

/// Run state stored on the recipe entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Current step
    pub step: GenerationStep,
    /// Lifecycle status
    pub status: GenerationStatus,
    /// Last error message
    pub error: Option<String>,
    /// Step at which the run failed, once failed
    pub failed_step: Option<GenerationStep>,
    /// When the entity was created
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// State of a freshly created placeholder.
    pub fn queued(now: DateTime<Utc>) -> Self {
        Self {
            step: GenerationStep::Queued,
            status: GenerationStatus::Pending,
            error: None,
            failed_step: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        self.step.is_terminal() || self.status.is_terminal()
    }

    /// Apply an update, dropping any field that would move backwards.
    ///
    /// Returns true when anything changed. A terminal state is never
    /// modified.
    pub fn apply(&mut self, update: &GenerationStateUpdate, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }

        let mut changed = false;

        if let Some(step) = update.step
            && step != self.step
            && self.step.can_transition_to(step)
        {
            if step == GenerationStep::Failed && self.failed_step.is_none() {
                self.failed_step = Some(update.failed_step.unwrap_or(self.step));
            }
            self.step = step;
            changed = true;
        }

        if let Some(status) = update.status
            && status != self.status
            && self.status.can_transition_to(status)
        {
            self.status = status;
            changed = true;
        }

        if let Some(error) = &update.error
            && self.error.as_deref() != Some(error.as_str())
        {
            self.error = Some(error.clone());
            changed = true;
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }
}
