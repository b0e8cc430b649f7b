//! Collaborator traits for the Escoffier recipe generation pipeline.
//!
//! The workflow crate depends only on these traits. PostgreSQL
//! implementations live in `escoffier_database`, the HTTP driver in
//! `escoffier_models`, and in-memory versions in `escoffier_workflow`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{CallLogSink, EscoffierDriver, RecipeRepository, RunQueue};
