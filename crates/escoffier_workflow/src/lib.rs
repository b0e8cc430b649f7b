//! Durable recipe generation workflow.
//!
//! A run walks a fixed sequence of steps: create a placeholder entity,
//! draft a recipe with a model, review the draft, fix what the review found,
//! and persist the result. Every step runs under a named [`RetryPolicy`]
//! and a start-to-close timeout; a run that cannot finish records its
//! failure on the entity before returning.
//!
//! # Architecture
//!
//! - [`StepExecutors`] do the work: model calls, call logging and
//!   persistence, each safe to repeat for the same run
//! - [`RecipeGenerationWorkflow`] sequences the executors and owns the
//!   failure path; it performs no I/O of its own
//! - [`WorkerRuntime`] claims runs from a [`RunQueue`](escoffier_interface::RunQueue)
//!   and executes them with bounded concurrency
//! - [`StatusProjection`] answers status queries from persisted state only
//! - [`GenerationService`] is the inbound surface: `start_run` and
//!   `get_status`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod activities;
mod coordinator;
mod in_memory;
mod prompts;
mod retry;
mod service;
mod settings;
mod status;
mod worker;

pub use activities::StepExecutors;
pub use coordinator::{
    ProgressHandle, RecipeGenerationWorkflow, WorkflowContext, WorkflowOutcome,
};
pub use in_memory::{InMemoryCallLog, InMemoryRecipeRepository, InMemoryRunQueue};
pub use prompts::{
    FIX_PARAMS, FIX_SYSTEM, GENERATE_PARAMS, GENERATE_SYSTEM, REVIEW_PARAMS, REVIEW_SYSTEM,
    fix_user_prompt, generate_user_prompt, review_user_prompt,
};
pub use retry::{BackoffDelays, RetryPolicies, RetryPolicy, StepRunner, StepTimeouts};
pub use service::{
    GenerationService, MAX_AMOUNT, RUN_ID_PREFIX, StartRunRequest, StartRunRequestBuilder,
    StartedRuns, new_run_id,
};
pub use settings::{RetryPolicySettings, RetrySettings, TimeoutSettings, WorkerSettings};
pub use status::StatusProjection;
pub use worker::{WorkerHandle, WorkerMessage, WorkerRuntime};
