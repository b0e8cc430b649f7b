//! Serializable knobs for the worker, retry policies and step timeouts.
//!
//! Durations are plain milliseconds so they read naturally in TOML and in
//! `ESCOFFIER__...` environment overrides.

use crate::{RetryPolicies, RetryPolicy, StepTimeouts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Logical queue this worker serves
    pub task_queue: String,
    /// Stable worker identity; derived from the task queue when unset
    pub worker_id: Option<String>,
    /// Ceiling on runs executing at once
    pub max_concurrent_workflow_tasks: usize,
    /// Ceiling on step attempts executing at once
    pub max_concurrent_activities: usize,
    /// How often to look for claimable runs
    pub poll_interval_ms: u64,
    /// How long a claim lasts without renewal
    pub lease_seconds: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            task_queue: "recipe-generation".to_string(),
            worker_id: None,
            max_concurrent_workflow_tasks: 100,
            max_concurrent_activities: 100,
            poll_interval_ms: 1_000,
            lease_seconds: 300,
        }
    }
}

impl WorkerSettings {
    /// Worker identity used for claims.
    ///
    /// Must survive restarts so a worker can reclaim its own runs.
    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{}-worker", self.task_queue))
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Lease length as a duration.
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_seconds.max(1))
    }
}

/// One retry policy in config form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay before the second attempt
    pub initial_interval_ms: u64,
    /// Delay multiplier
    pub backoff_coefficient: f64,
    /// Total attempts
    pub max_attempts: u32,
    /// Ceiling on a single delay
    pub max_interval_ms: u64,
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            initial_interval: Duration::from_millis(settings.initial_interval_ms),
            backoff_coefficient: settings.backoff_coefficient,
            max_attempts: settings.max_attempts.max(1),
            max_interval: Duration::from_millis(settings.max_interval_ms),
        }
    }
}

impl From<RetryPolicy> for RetrySettings {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            initial_interval_ms: policy.initial_interval.as_millis() as u64,
            backoff_coefficient: policy.backoff_coefficient,
            max_attempts: policy.max_attempts,
            max_interval_ms: policy.max_interval.as_millis() as u64,
        }
    }
}

/// Both named policies in config form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicySettings {
    /// Generative-call policy
    pub generative: RetrySettings,
    /// Persistence policy
    pub persistence: RetrySettings,
}

impl Default for RetryPolicySettings {
    fn default() -> Self {
        Self {
            generative: RetryPolicy::generative().into(),
            persistence: RetryPolicy::persistence().into(),
        }
    }
}

impl From<RetryPolicySettings> for RetryPolicies {
    fn from(settings: RetryPolicySettings) -> Self {
        Self {
            generative: settings.generative.into(),
            persistence: settings.persistence.into(),
        }
    }
}

/// Per-step start-to-close timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// CreatePlaceholder
    pub create_placeholder_ms: u64,
    /// GenerateContent
    pub generate_ms: u64,
    /// ReviewQuality
    pub review_ms: u64,
    /// FixIssues
    pub fix_ms: u64,
    /// Finalize
    pub finalize_ms: u64,
    /// MarkFailed
    pub mark_failed_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        let timeouts = StepTimeouts::default();
        Self {
            create_placeholder_ms: timeouts.create_placeholder.as_millis() as u64,
            generate_ms: timeouts.generate.as_millis() as u64,
            review_ms: timeouts.review.as_millis() as u64,
            fix_ms: timeouts.fix.as_millis() as u64,
            finalize_ms: timeouts.finalize.as_millis() as u64,
            mark_failed_ms: timeouts.mark_failed.as_millis() as u64,
        }
    }
}

impl From<TimeoutSettings> for StepTimeouts {
    fn from(settings: TimeoutSettings) -> Self {
        Self {
            create_placeholder: Duration::from_millis(settings.create_placeholder_ms),
            generate: Duration::from_millis(settings.generate_ms),
            review: Duration::from_millis(settings.review_ms),
            fix: Duration::from_millis(settings.fix_ms),
            finalize: Duration::from_millis(settings.finalize_ms),
            mark_failed: Duration::from_millis(settings.mark_failed_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_named_policies() {
        let policies = RetryPolicies::from(RetryPolicySettings::default());
        assert_eq!(policies, RetryPolicies::default());
        assert_eq!(
            StepTimeouts::from(TimeoutSettings::default()),
            StepTimeouts::default()
        );
    }

    #[test]
    fn test_worker_id_falls_back_to_task_queue() {
        let mut settings = WorkerSettings::default();
        assert_eq!(settings.worker_id(), "recipe-generation-worker");
        settings.worker_id = Some("kitchen-1".into());
        assert_eq!(settings.worker_id(), "kitchen-1");
    }
}
