//! Database error types.

/// Database error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum DatabaseErrorKind {
    /// Connection failed
    #[display("Database connection error: {}", _0)]
    Connection(String),
    /// Could not check a connection out of the pool
    #[display("Connection pool error: {}", _0)]
    Pool(String),
    /// Query execution failed
    #[display("Database query error: {}", _0)]
    Query(String),
    /// Serialization/deserialization error
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Migration error
    #[display("Migration error: {}", _0)]
    Migration(String),
    /// Record not found
    #[display("Record not found")]
    NotFound,
    /// Unique constraint violated
    #[display("Conflicting record: {}", _0)]
    Conflict(String),
}

impl DatabaseErrorKind {
    /// Connectivity blips and contention are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseErrorKind::Connection(_)
                | DatabaseErrorKind::Pool(_)
                | DatabaseErrorKind::Query(_)
        )
    }
}

/// Database error with source location tracking.
///
/// # Examples
///
/// ```
/// use escoffier_error::{DatabaseError, DatabaseErrorKind};
///
/// let err = DatabaseError::new(DatabaseErrorKind::NotFound);
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Database Error: {} at line {} in {}", kind, line, file)]
pub struct DatabaseError {
    /// The kind of error that occurred
    pub kind: DatabaseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DatabaseError {
    /// Create a new DatabaseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

// Diesel error conversions (only available with database feature)
#[cfg(feature = "database")]
impl From<diesel::result::Error> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind as DieselKind, Error};

        match err {
            Error::NotFound => DatabaseError::new(DatabaseErrorKind::NotFound),
            Error::DatabaseError(DieselKind::UniqueViolation, info) => {
                DatabaseError::new(DatabaseErrorKind::Conflict(info.message().to_string()))
            }
            Error::SerializationError(e) | Error::DeserializationError(e) => {
                DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string()))
            }
            _ => DatabaseError::new(DatabaseErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<diesel::r2d2::PoolError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::r2d2::PoolError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Pool(err.to_string()))
    }
}

impl From<serde_json::Error> for DatabaseError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::new(DatabaseErrorKind::Serialization(err.to_string()))
    }
}
