//! Top-level error wrapper types.

use crate::{
    ConfigError, DatabaseError, DatabaseErrorKind, JsonError, ModelsError, RetryableError,
    WorkflowError, WorkflowErrorKind,
};

/// Every error the pipeline can produce.
///
/// # Examples
///
/// ```
/// use escoffier_error::{EscoffierError, JsonError};
///
/// let json_err = JsonError::new("Unexpected end of input");
/// let err: EscoffierError = json_err.into();
/// assert!(format!("{}", err).contains("JSON Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum EscoffierErrorKind {
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Database error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Generation client error
    #[from(ModelsError)]
    Models(ModelsError),
    /// Orchestration error
    #[from(WorkflowError)]
    Workflow(WorkflowError),
}

/// Escoffier error with kind discrimination.
///
/// # Examples
///
/// ```
/// use escoffier_error::{ConfigError, EscoffierResult};
///
/// fn might_fail() -> EscoffierResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Escoffier Error: {}", _0)]
pub struct EscoffierError(Box<EscoffierErrorKind>);

impl EscoffierError {
    /// Create a new error from a kind.
    pub fn new(kind: EscoffierErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &EscoffierErrorKind {
        &self.0
    }

    /// The error condition without source locations, suitable for storing
    /// on a failed run and showing to pollers.
    pub fn summary(&self) -> String {
        match self.kind() {
            EscoffierErrorKind::Json(e) => e.message.clone(),
            EscoffierErrorKind::Config(e) => e.message.clone(),
            EscoffierErrorKind::Database(e) => e.kind.to_string(),
            EscoffierErrorKind::Models(e) => e.kind.to_string(),
            EscoffierErrorKind::Workflow(e) => e.kind.to_string(),
        }
    }

    /// True when the error means the recipe entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self.kind() {
            EscoffierErrorKind::Database(e) => e.kind == DatabaseErrorKind::NotFound,
            EscoffierErrorKind::Workflow(e) => {
                matches!(e.kind, WorkflowErrorKind::RecipeNotFound(_))
            }
            _ => false,
        }
    }
}

impl RetryableError for EscoffierError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            EscoffierErrorKind::Json(_) => false,
            EscoffierErrorKind::Config(_) => false,
            EscoffierErrorKind::Database(e) => e.is_retryable(),
            EscoffierErrorKind::Models(e) => e.is_retryable(),
            EscoffierErrorKind::Workflow(e) => e.is_retryable(),
        }
    }
}

// Generic From implementation for any type that converts to EscoffierErrorKind
impl<T> From<T> for EscoffierError
where
    T: Into<EscoffierErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Escoffier operations.
pub type EscoffierResult<T> = std::result::Result<T, EscoffierError>;
