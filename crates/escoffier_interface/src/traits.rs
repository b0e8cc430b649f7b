//! Trait definitions for the pipeline's external collaborators.

use async_trait::async_trait;
use escoffier_core::{
    CallLogEntry, CompletionRequest, CompletionResponse, FinalizedRecipe, GenerationRequest,
    GenerationStateUpdate, NewRecipePlaceholder, QueuedRun, Recipe,
};
use escoffier_error::EscoffierResult;
use std::time::Duration;
use uuid::Uuid;

/// Core trait every model backend implements.
///
/// One call, one completion. Retrying and output validation happen above
/// this layer.
#[async_trait]
pub trait EscoffierDriver: Send + Sync {
    /// Generate a completion for the given conversation.
    async fn generate(&self, req: &CompletionRequest) -> EscoffierResult<CompletionResponse>;

    /// Provider name (e.g., "openai-compatible").
    fn provider_name(&self) -> &'static str;

    /// Model identifier (e.g., "Qwen/Qwen2.5-1.5B-Instruct-AWQ").
    fn model_name(&self) -> &str;
}

/// Persistence for recipe entities and their run state.
///
/// Every method is an independent, atomic operation. Implementations must
/// keep transactions scoped to a single call.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Insert the placeholder, or return the existing entity with the same id.
    async fn create_placeholder(&self, placeholder: &NewRecipePlaceholder)
    -> EscoffierResult<Recipe>;

    /// Load an entity by id.
    async fn get_recipe(&self, id: Uuid) -> EscoffierResult<Option<Recipe>>;

    /// All entities whose run id starts with `prefix`, oldest first.
    async fn find_by_run_prefix(&self, prefix: &str) -> EscoffierResult<Vec<Recipe>>;

    /// Apply a run-state update under the forward-only transition rules.
    ///
    /// Fields that would regress are dropped; the stored result is returned.
    async fn update_generation_state(
        &self,
        id: Uuid,
        update: &GenerationStateUpdate,
    ) -> EscoffierResult<Recipe>;

    /// Write final content and mark the entity completed in one step.
    ///
    /// Re-running with identical content leaves the entity untouched.
    async fn finalize_recipe(&self, id: Uuid, recipe: &FinalizedRecipe)
    -> EscoffierResult<Recipe>;
}

/// Append-only sink for generative-model call records.
#[async_trait]
pub trait CallLogSink: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &CallLogEntry) -> EscoffierResult<()>;

    /// Entries for a run, in insertion order.
    async fn entries_for_run(&self, run_id: &str) -> EscoffierResult<Vec<CallLogEntry>>;
}

/// Durable queue the worker runtime pulls runs from.
#[async_trait]
pub trait RunQueue: Send + Sync {
    /// Add a run. Enqueuing an existing run id is a no-op.
    async fn enqueue(&self, request: &GenerationRequest) -> EscoffierResult<()>;

    /// Claim up to `limit` pending runs or runs whose lease has expired.
    async fn claim(
        &self,
        worker_id: &str,
        lease: Duration,
        limit: usize,
    ) -> EscoffierResult<Vec<QueuedRun>>;

    /// Claims still held by `worker_id`, with their leases refreshed.
    ///
    /// Called on startup so a restarted worker resumes its own runs first.
    async fn reclaim(&self, worker_id: &str, lease: Duration) -> EscoffierResult<Vec<QueuedRun>>;

    /// Extend the leases `worker_id` holds on `run_ids`.
    async fn renew(&self, worker_id: &str, run_ids: &[String], lease: Duration)
    -> EscoffierResult<()>;

    /// Mark a run finished. `error` is set when it ended failed.
    async fn complete(&self, run_id: &str, error: Option<&str>) -> EscoffierResult<()>;

    /// All queued runs whose id starts with `prefix`.
    async fn find_by_prefix(&self, prefix: &str) -> EscoffierResult<Vec<QueuedRun>>;
}
