//! Retry classification shared by every error type.

use crate::{DatabaseError, ModelsError, WorkflowError};

/// Trait for errors that support retry logic.
///
/// Transient errors (timeouts, connection drops, 429/5xx responses, output
/// that never validated) return true. Permanent errors (bad configuration,
/// missing records, invalid requests) return false and end the step without
/// spending its remaining attempts.
///
/// # Examples
///
/// ```
/// use escoffier_error::{ModelsError, ModelsErrorKind, RetryableError};
///
/// let err = ModelsError::new(ModelsErrorKind::HttpStatus {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
///
/// let err = ModelsError::new(ModelsErrorKind::HttpStatus {
///     status_code: 401,
///     message: "Unauthorized".to_string(),
/// });
/// assert!(!err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger another attempt.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ModelsError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl RetryableError for DatabaseError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl RetryableError for WorkflowError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
