//! Durable run queue entries.

use crate::GenerationRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a queued run is in its dispatch lifecycle.
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
pub enum QueueState {
    /// Waiting for a worker
    Pending,
    /// Held by a worker until its lease expires
    Claimed,
    /// Reached completed
    Done,
    /// Reached failed
    Failed,
}

impl QueueState {
    /// Whether no worker will pick the run up again.
    pub fn is_finished(self) -> bool {
        matches!(self, QueueState::Done | QueueState::Failed)
    }
}

/// A run as stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRun {
    /// Run id
    pub run_id: String,
    /// Request the run executes
    pub request: GenerationRequest,
    /// Dispatch state
    pub state: QueueState,
    /// Worker holding the claim
    pub claimed_by: Option<String>,
    /// Claim expiry
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// How many times the run has been claimed
    pub dispatch_count: u32,
    /// Failure text once failed
    pub error: Option<String>,
    /// Enqueue time
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedRun {
    /// A freshly enqueued run.
    pub fn pending(request: GenerationRequest, now: DateTime<Utc>) -> Self {
        Self {
            run_id: request.run_id.clone(),
            request,
            state: QueueState::Pending,
            claimed_by: None,
            lease_expires_at: None,
            dispatch_count: 0,
            error: None,
            enqueued_at: now,
        }
    }

    /// Whether a worker may claim this run at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            QueueState::Pending => true,
            QueueState::Claimed => self.lease_expires_at.is_none_or(|expiry| expiry <= now),
            QueueState::Done | QueueState::Failed => false,
        }
    }
}
