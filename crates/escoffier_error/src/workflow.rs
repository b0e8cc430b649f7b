//! Pipeline orchestration errors.

/// Workflow error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum WorkflowErrorKind {
    /// A single attempt ran past its start-to-close timeout
    #[display("Step '{}' timed out after {}ms", step, timeout_ms)]
    StepTimedOut {
        /// Step name
        step: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },
    /// Every attempt allowed by the retry policy failed
    #[display("Step '{}' failed after {} attempts: {}", step, attempts, message)]
    RetriesExhausted {
        /// Step name
        step: String,
        /// Attempts made
        attempts: u32,
        /// Last error message
        message: String,
    },
    /// A run state change would move backwards or out of a terminal state
    #[display("Invalid transition from '{}' to '{}'", from, to)]
    InvalidTransition {
        /// Current step
        from: String,
        /// Requested step
        to: String,
    },
    /// No recipe entity exists for the id
    #[display("Recipe not found: {}", _0)]
    RecipeNotFound(String),
    /// No run is known under the id
    #[display("Run not found: {}", _0)]
    RunNotFound(String),
    /// The generation request cannot be started
    #[display("Invalid generation request: {}", _0)]
    InvalidRequest(String),
    /// The worker runtime is no longer accepting work
    #[display("Worker queue closed")]
    QueueClosed,
    /// A spawned run task panicked or was cancelled
    #[display("Run task failed to join: {}", _0)]
    Join(String),
}

impl WorkflowErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowErrorKind::StepTimedOut { .. })
    }
}

/// Workflow error with source location tracking.
///
/// # Examples
///
/// ```
/// use escoffier_error::{WorkflowError, WorkflowErrorKind};
///
/// let err = WorkflowError::new(WorkflowErrorKind::RunNotFound("recipe-gen-1".into()));
/// assert!(format!("{}", err).contains("recipe-gen-1"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Workflow Error: {} at line {} in {}", kind, line, file)]
pub struct WorkflowError {
    /// The specific error condition
    pub kind: WorkflowErrorKind,
    /// Line number where the error was created
    pub line: u32,
    /// File where the error was created
    pub file: &'static str,
}

impl WorkflowError {
    /// Create a new WorkflowError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: WorkflowErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
