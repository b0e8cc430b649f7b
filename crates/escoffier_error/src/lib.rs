//! Error types for the Escoffier pipeline.
//!
//! This crate provides the foundation error types used throughout the Escoffier workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Every error also answers [`RetryableError::is_retryable`], which is how
//! the pipeline tells transient failures from terminal ones.
//!
//! # Examples
//!
//! ```
//! use escoffier_error::{DatabaseError, DatabaseErrorKind, EscoffierResult};
//!
//! fn fetch_data() -> EscoffierResult<String> {
//!     Err(DatabaseError::new(DatabaseErrorKind::NotFound))?
//! }
//!
//! match fetch_data() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod json;
mod models;
mod retry;
mod workflow;

pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{EscoffierError, EscoffierErrorKind, EscoffierResult};
pub use json::JsonError;
pub use models::{ModelsError, ModelsErrorKind};
pub use retry::RetryableError;
pub use workflow::{WorkflowError, WorkflowErrorKind};
