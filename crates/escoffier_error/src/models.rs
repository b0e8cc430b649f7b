//! Generation client errors.

/// Generation client error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ModelsErrorKind {
    /// Connection or protocol failure talking to the model server
    #[display("Transport failure: {}", _0)]
    Transport(String),
    /// The model server did not answer in time
    #[display("Model request timed out: {}", _0)]
    Timeout(String),
    /// Non-success HTTP status returned by the model server
    #[display("HTTP {} error: {}", status_code, message)]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// The model returned no choices or an empty message
    #[display("Model returned an empty response")]
    EmptyResponse,
    /// Output never matched the requested shape
    #[display("Output failed schema validation after {} attempts: {}", attempts, message)]
    SchemaValidation {
        /// Number of completions requested before giving up
        attempts: u32,
        /// Last validation failure
        message: String,
    },
    /// Client configuration is unusable
    #[display("Missing model configuration: {}", _0)]
    MissingConfiguration(String),
}

impl ModelsErrorKind {
    /// Check if this error type should be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelsErrorKind::HttpStatus { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            ModelsErrorKind::Transport(_) => true,
            ModelsErrorKind::Timeout(_) => true,
            ModelsErrorKind::EmptyResponse => true,
            ModelsErrorKind::SchemaValidation { .. } => true,
            ModelsErrorKind::MissingConfiguration(_) => false,
        }
    }
}

/// Generation client error with location tracking.
///
/// # Examples
///
/// ```
/// use escoffier_error::{ModelsError, ModelsErrorKind};
///
/// let err = ModelsError::new(ModelsErrorKind::EmptyResponse);
/// assert!(format!("{}", err).contains("empty"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Models Error: {} at {}:{}", kind, file, line)]
pub struct ModelsError {
    /// The specific error kind
    pub kind: ModelsErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl ModelsError {
    /// Create a new models error.
    #[track_caller]
    pub fn new(kind: ModelsErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
