//! Step executors: the only code in a run that touches the model, the
//! clock or persistence.

use crate::prompts::{
    FIX_PARAMS, FIX_SYSTEM, GENERATE_PARAMS, GENERATE_SYSTEM, REVIEW_PARAMS, REVIEW_SYSTEM,
    fix_user_prompt, generate_user_prompt, review_user_prompt,
};
use escoffier_core::{
    CallLogEntry, CallLogEntryBuilder, DraftContent, FinalizedRecipe, FixedContent,
    GenerationRequest, GenerationStateUpdate, GenerationStatus, GenerationStep, LogStep,
    NewRecipePlaceholder, Recipe, ReviewList, ReviewResult, StructuredOutput, recipe_id_for_run,
};
use escoffier_error::{EscoffierResult, JsonError};
use escoffier_interface::{CallLogSink, RecipeRepository};
use escoffier_models::{Completion, GenerationClient, structured_system_prompt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Error text for a call whose attempt was dropped before it returned.
const ABANDONED_CALL: &str = "call abandoned before completion";

/// The six units of work a run is made of.
///
/// Each method is safe to call again for the same run: placeholders are
/// insert-or-get, state updates never regress, and finalize overwrites.
#[derive(Clone)]
pub struct StepExecutors {
    recipes: Arc<dyn RecipeRepository>,
    call_log: Arc<dyn CallLogSink>,
    client: GenerationClient,
}

impl std::fmt::Debug for StepExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutors")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl StepExecutors {
    /// Wire executors to their collaborators.
    pub fn new(
        recipes: Arc<dyn RecipeRepository>,
        call_log: Arc<dyn CallLogSink>,
        client: GenerationClient,
    ) -> Self {
        Self {
            recipes,
            call_log,
            client,
        }
    }

    /// Insert (or find) the recipe entity for this run and mark it creating.
    ///
    /// An entity that already reached a terminal state is returned as is.
    #[instrument(skip(self, request), fields(run_id = %request.run_id))]
    pub async fn create_placeholder(&self, request: &GenerationRequest) -> EscoffierResult<Recipe> {
        let placeholder = NewRecipePlaceholder {
            id: recipe_id_for_run(&request.run_id),
            run_id: request.run_id.clone(),
            created_by: request.user_id.clone(),
            prompt: request.prompt.clone(),
            request: serde_json::to_value(request).map_err(JsonError::from)?,
        };

        let recipe = self.recipes.create_placeholder(&placeholder).await?;
        if recipe.state.is_terminal() {
            info!(recipe_id = %recipe.id, step = %recipe.state.step, "Run already finished");
            return Ok(recipe);
        }

        self.recipes
            .update_generation_state(
                recipe.id,
                &GenerationStateUpdate::step(GenerationStep::Creating),
            )
            .await
    }

    /// Draft a recipe from the request.
    #[instrument(skip(self, request), fields(run_id = %request.run_id))]
    pub async fn generate_content(
        &self,
        recipe_id: Uuid,
        request: &GenerationRequest,
    ) -> EscoffierResult<DraftContent> {
        self.recipes
            .update_generation_state(
                recipe_id,
                &GenerationStateUpdate::step_and_status(
                    GenerationStep::Generating,
                    GenerationStatus::InProgress,
                ),
            )
            .await?;

        let system = structured_system_prompt::<DraftContent>(GENERATE_SYSTEM);
        let user = generate_user_prompt(request);
        let call = self.start_call(&request.run_id, recipe_id, LogStep::Generate, &system, &user);

        let result = self
            .client
            .complete::<DraftContent>(&system, &user, GENERATE_PARAMS)
            .await;
        call.finish(&result).await;

        result.map(|completion| completion.value)
    }

    /// Critique a draft. An empty review list means "no issues".
    #[instrument(skip(self, draft), fields(draft = %draft.name))]
    pub async fn review_quality(
        &self,
        run_id: &str,
        recipe_id: Uuid,
        draft: &DraftContent,
    ) -> EscoffierResult<ReviewResult> {
        self.recipes
            .update_generation_state(
                recipe_id,
                &GenerationStateUpdate::step(GenerationStep::Reviewing),
            )
            .await?;

        let system = structured_system_prompt::<ReviewList>(REVIEW_SYSTEM);
        let user = review_user_prompt(draft);
        let call = self.start_call(run_id, recipe_id, LogStep::Review, &system, &user);

        let result = self
            .client
            .complete::<ReviewList>(&system, &user, REVIEW_PARAMS)
            .await;
        call.finish(&result).await;

        let review = result?.value.into_first();
        debug!(
            quality = review.overall_quality,
            needs_fixes = review.needs_fixes,
            "Review complete"
        );
        Ok(review)
    }

    /// Repair a draft using the review's findings.
    ///
    /// Returns the input unchanged, without calling the model, when no fixes
    /// are needed. A failed model call also returns the input unchanged.
    #[instrument(skip(self, draft, review), fields(draft = %draft.name))]
    pub async fn fix_issues(
        &self,
        run_id: &str,
        recipe_id: Uuid,
        draft: &DraftContent,
        review: &ReviewResult,
    ) -> EscoffierResult<DraftContent> {
        if !review.needs_fixes {
            debug!("No fixes needed");
            return Ok(draft.clone());
        }

        self.recipes
            .update_generation_state(
                recipe_id,
                &GenerationStateUpdate::step(GenerationStep::Fixing),
            )
            .await?;

        let system = structured_system_prompt::<FixedContent>(FIX_SYSTEM);
        let user = fix_user_prompt(draft, &review.issues());
        let call = self.start_call(run_id, recipe_id, LogStep::Fix, &system, &user);

        let result = self
            .client
            .complete::<FixedContent>(&system, &user, FIX_PARAMS)
            .await;
        call.finish(&result).await;

        match result {
            Ok(completion) => {
                debug!(changes = completion.value.changes_made.len(), "Draft fixed");
                Ok(completion.value.into_draft())
            }
            Err(e) => {
                warn!(error = %e.summary(), "Fix failed, keeping the unfixed draft");
                Ok(draft.clone())
            }
        }
    }

    /// Persist the final draft and complete the entity.
    #[instrument(skip(self, draft), fields(draft = %draft.name))]
    pub async fn finalize(&self, recipe_id: Uuid, draft: &DraftContent) -> EscoffierResult<Recipe> {
        let finalized = FinalizedRecipe::from(draft);
        if finalized.food_type.is_none() {
            warn!(food_type = %draft.food_type, "Unknown food type, storing none");
        }
        self.recipes.finalize_recipe(recipe_id, &finalized).await
    }

    /// Record that the run failed at `failed_step`.
    #[instrument(skip(self, message))]
    pub async fn mark_failed(
        &self,
        recipe_id: Uuid,
        failed_step: GenerationStep,
        message: &str,
    ) -> EscoffierResult<Recipe> {
        self.recipes
            .update_generation_state(
                recipe_id,
                &GenerationStateUpdate::failed(failed_step, message),
            )
            .await
    }

    /// Model identifier recorded in call logs.
    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    fn start_call(
        &self,
        run_id: &str,
        recipe_id: Uuid,
        step: LogStep,
        system: &str,
        user: &str,
    ) -> PendingCall {
        let mut entry = CallLogEntry::builder();
        entry
            .run_id(run_id)
            .recipe_id(recipe_id)
            .step(step)
            .system_prompt(system)
            .user_prompt(user)
            .model(self.client.model_name());

        PendingCall {
            sink: Arc::clone(&self.call_log),
            entry,
            started: Instant::now(),
            finished: false,
        }
    }
}

/// A model call whose log entry has not been written yet.
///
/// `finish` writes the entry. If the attempt is dropped first, for example
/// by its step timeout, a failed entry is written from `Drop`.
struct PendingCall {
    sink: Arc<dyn CallLogSink>,
    entry: CallLogEntryBuilder,
    started: Instant,
    finished: bool,
}

impl PendingCall {
    async fn finish<T: StructuredOutput>(
        mut self,
        result: &EscoffierResult<Completion<T>>,
    ) {
        self.finished = true;
        let mut entry = self.entry.clone();
        entry.duration_ms(self.started.elapsed().as_millis() as i64);

        match result {
            Ok(completion) => {
                entry
                    .success(true)
                    .raw_response(completion.raw.clone())
                    .parsed_response(serde_json::to_value(&completion.value).ok());
            }
            Err(e) => {
                entry.success(false).error(Some(e.summary()));
            }
        }

        append(&*self.sink, entry).await;
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to record an abandoned model call");
            return;
        };

        let mut entry = self.entry.clone();
        entry
            .duration_ms(self.started.elapsed().as_millis() as i64)
            .success(false)
            .error(Some(ABANDONED_CALL.to_string()));
        let sink = Arc::clone(&self.sink);
        handle.spawn(async move { append(&*sink, entry).await });
    }
}

async fn append(sink: &dyn CallLogSink, entry: CallLogEntryBuilder) {
    let entry = match entry.build() {
        Ok(entry) => entry,
        Err(e) => {
            warn!(error = %e, "Incomplete call log entry");
            return;
        }
    };
    if let Err(e) = sink.append(&entry).await {
        warn!(error = %e.summary(), step = %entry.step, "Failed to append call log entry");
    }
}
