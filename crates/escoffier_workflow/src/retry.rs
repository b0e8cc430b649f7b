//! Per-step retry policies and the attempt loop that applies them.

use escoffier_core::GenerationStep;
use escoffier_error::{
    EscoffierError, EscoffierResult, RetryableError, WorkflowError, WorkflowErrorKind,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Backoff parameters for one class of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_coefficient: f64,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Ceiling on any single delay
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Policy for steps dominated by model latency.
    pub const fn generative() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            max_attempts: 3,
            max_interval: Duration::from_secs(30),
        }
    }

    /// Policy for short persistence writes.
    pub const fn persistence() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            backoff_coefficient: 1.5,
            max_attempts: 3,
            max_interval: Duration::from_secs(5),
        }
    }

    /// Delays slept between attempts, `max_attempts - 1` of them.
    pub fn delays(&self) -> BackoffDelays {
        BackoffDelays {
            next: self.initial_interval.min(self.max_interval),
            coefficient: self.backoff_coefficient.max(1.0),
            max: self.max_interval,
            remaining: self.max_attempts.saturating_sub(1),
        }
    }

    /// Upper bound on the total time spent sleeping between attempts.
    pub fn max_total_delay(&self) -> Duration {
        self.max_interval * self.max_attempts.saturating_sub(1)
    }
}

/// Exponential delays capped at the policy's max interval.
#[derive(Debug, Clone)]
pub struct BackoffDelays {
    next: Duration,
    coefficient: f64,
    max: Duration,
    remaining: u32,
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next;
        self.next = self.next.mul_f64(self.coefficient).min(self.max);
        Some(delay)
    }
}

/// The two named policies, one per step class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicies {
    /// Generate, review and fix
    pub generative: RetryPolicy,
    /// Placeholder, finalize and mark-failed
    pub persistence: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            generative: RetryPolicy::generative(),
            persistence: RetryPolicy::persistence(),
        }
    }
}

/// Start-to-close timeout for a single attempt of each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    /// CreatePlaceholder
    pub create_placeholder: Duration,
    /// GenerateContent
    pub generate: Duration,
    /// ReviewQuality
    pub review: Duration,
    /// FixIssues
    pub fix: Duration,
    /// Finalize
    pub finalize: Duration,
    /// MarkFailed
    pub mark_failed: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            create_placeholder: Duration::from_secs(10),
            generate: Duration::from_secs(120),
            review: Duration::from_secs(120),
            fix: Duration::from_secs(120),
            finalize: Duration::from_secs(30),
            mark_failed: Duration::from_secs(10),
        }
    }
}

/// Runs step attempts under a retry policy, a per-attempt timeout and the
/// shared ceiling on in-flight activity calls.
#[derive(Debug, Clone)]
pub struct StepRunner {
    slots: Arc<Semaphore>,
}

impl StepRunner {
    /// Runner allowing `max_concurrent_activities` attempts at once across
    /// every run that shares it.
    pub fn new(max_concurrent_activities: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent_activities.max(1))),
        }
    }

    /// Attempts currently free to start.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run `action` until it succeeds, fails permanently, or the policy
    /// runs out of attempts.
    ///
    /// An attempt that outlives `timeout` is dropped and counts as a
    /// retryable [`WorkflowErrorKind::StepTimedOut`]. Exhausting the policy
    /// on a retryable error yields [`WorkflowErrorKind::RetriesExhausted`];
    /// a permanent error is returned as is.
    pub async fn run<T, F, Fut>(
        &self,
        step: GenerationStep,
        policy: &RetryPolicy,
        timeout: Duration,
        mut action: F,
    ) -> EscoffierResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EscoffierResult<T>>,
    {
        let mut attempts = 0u32;
        let max_attempts = policy.max_attempts.max(1);

        let outcome = Retry::spawn(policy.delays(), || {
            attempts += 1;
            let attempt = attempts;
            let slots = Arc::clone(&self.slots);
            let work = action();
            async move {
                let _permit = slots.acquire_owned().await.map_err(|_| {
                    RetryError::Permanent(EscoffierError::from(WorkflowError::new(
                        WorkflowErrorKind::QueueClosed,
                    )))
                })?;

                let result = match tokio::time::timeout(timeout, work).await {
                    Ok(result) => result,
                    Err(_) => Err(WorkflowError::new(WorkflowErrorKind::StepTimedOut {
                        step: step.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                    .into()),
                };

                match result {
                    Ok(value) => {
                        debug!(%step, attempt, "Step attempt succeeded");
                        Ok(value)
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(%step, attempt, max_attempts, error = %e.summary(), "Step attempt failed, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        warn!(%step, attempt, error = %e.summary(), "Permanent step error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => {
                Err(WorkflowError::new(WorkflowErrorKind::RetriesExhausted {
                    step: step.to_string(),
                    attempts,
                    message: e.summary(),
                })
                .into())
            }
            Err(e) => Err(e),
        }
    }
}
