//! Core data types for the Escoffier recipe generation pipeline.
//!
//! This crate provides the data model shared by every other crate: the
//! immutable [`GenerationRequest`], the persisted [`RunState`], the transient
//! [`DraftContent`] and [`ReviewResult`] passed between steps, and the
//! write-once [`CallLogEntry`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod call_log;
mod message;
mod queue;
mod recipe;
mod request;
mod review;
mod shape;
mod state;
mod status;

pub use call_log::{CallLogEntry, CallLogEntryBuilder, LogStep};
pub use message::{CompletionRequest, CompletionResponse, Message, Role};
pub use queue::{QueueState, QueuedRun};
pub use recipe::{
    DraftContent, FinalizeOutcome, FinalizedRecipe, FixedContent, FoodType, Ingredient,
    MAX_NAME_LEN, NewRecipePlaceholder, Recipe, recipe_id_for_run,
};
pub use request::{GenerationRequest, GenerationRequestBuilder};
pub use review::{IngredientIssue, ReviewIssues, ReviewList, ReviewResult};
pub use shape::StructuredOutput;
pub use state::{GenerationStateUpdate, GenerationStatus, GenerationStep, RunState};
pub use status::{GenerateStatus, GenerationStatusReport, RunProgress};
