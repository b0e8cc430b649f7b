//! The recipe generation state machine.

use crate::{RetryPolicies, RetryPolicy, StepExecutors, StepRunner, StepTimeouts};
use escoffier_core::{GenerationRequest, GenerationStep, Recipe, RunProgress, recipe_id_for_run};
use escoffier_error::{EscoffierError, EscoffierResult};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Everything runs share: executors, the attempt runner, policies and
/// timeouts.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    executors: StepExecutors,
    runner: StepRunner,
    policies: RetryPolicies,
    timeouts: StepTimeouts,
}

impl WorkflowContext {
    /// Context with the default policies and timeouts.
    pub fn new(executors: StepExecutors, runner: StepRunner) -> Self {
        Self {
            executors,
            runner,
            policies: RetryPolicies::default(),
            timeouts: StepTimeouts::default(),
        }
    }

    /// Replace the retry policies.
    pub fn with_policies(mut self, policies: RetryPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Replace the step timeouts.
    pub fn with_timeouts(mut self, timeouts: StepTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Configured retry policies.
    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    /// Configured step timeouts.
    pub fn timeouts(&self) -> &StepTimeouts {
        &self.timeouts
    }

    /// Attempt runner shared by every run on this context.
    pub fn runner(&self) -> &StepRunner {
        &self.runner
    }
}

/// Shared, read-only view of a run's progress.
#[derive(Debug, Clone)]
pub struct ProgressHandle(Arc<RwLock<RunProgress>>);

impl ProgressHandle {
    fn new(run_id: &str) -> Self {
        Self(Arc::new(RwLock::new(RunProgress::new(run_id))))
    }

    /// Current progress.
    pub fn snapshot(&self) -> RunProgress {
        self.0.read().clone()
    }

    fn enter(&self, step: GenerationStep) {
        self.0.write().current_step = step;
    }

    fn set_recipe(&self, recipe_id: Uuid) {
        self.0.write().recipe_id = Some(recipe_id);
    }

    fn set_error(&self, error: &str) {
        self.0.write().error = Some(error.to_string());
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The recipe was finalized
    Completed {
        /// Stored entity
        recipe: Box<Recipe>,
    },
    /// The run failed
    Failed {
        /// Entity id derived from the run id
        recipe_id: Uuid,
        /// Step that failed
        failed_step: GenerationStep,
        /// `Failed at <step>: <error>`
        error: String,
        /// Whether the failure is stored on the entity
        recorded: bool,
    },
}

impl WorkflowOutcome {
    /// Outcome of a run whose entity was already terminal.
    fn from_terminal(recipe: Recipe) -> Self {
        if recipe.state.step == GenerationStep::Completed {
            return WorkflowOutcome::Completed {
                recipe: Box::new(recipe),
            };
        }
        WorkflowOutcome::Failed {
            recipe_id: recipe.id,
            failed_step: recipe.state.failed_step.unwrap_or(recipe.state.step),
            error: recipe.state.error.unwrap_or_default(),
            recorded: true,
        }
    }

    /// Whether the run reached completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }

    /// Failure text, if the run failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            WorkflowOutcome::Completed { .. } => None,
            WorkflowOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Whether the queue entry can be closed.
    ///
    /// A failure that could not be written to the entity is left open so
    /// the run is dispatched again.
    pub fn is_settled(&self) -> bool {
        match self {
            WorkflowOutcome::Completed { .. } => true,
            WorkflowOutcome::Failed { recorded, .. } => *recorded,
        }
    }
}

/// One run of the pipeline.
///
/// Executes create, generate, review, fix and finalize in order. The
/// coordinator itself does no I/O: every effect goes through
/// [`StepExecutors`], so running it again from the top after a restart is
/// safe.
#[derive(Debug)]
pub struct RecipeGenerationWorkflow {
    context: Arc<WorkflowContext>,
    request: GenerationRequest,
    progress: ProgressHandle,
}

impl RecipeGenerationWorkflow {
    /// Prepare a run for `request`.
    pub fn new(context: Arc<WorkflowContext>, request: GenerationRequest) -> Self {
        let progress = ProgressHandle::new(&request.run_id);
        Self {
            context,
            request,
            progress,
        }
    }

    /// Handle for progress queries while the run executes.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Drive the run to a terminal outcome.
    #[instrument(skip(self), fields(run_id = %self.request.run_id))]
    pub async fn run(self) -> WorkflowOutcome {
        let context = Arc::clone(&self.context);
        let executors = &context.executors;
        let policies = &context.policies;
        let timeouts = &context.timeouts;
        let request = &self.request;

        let recipe = match self
            .step(
                GenerationStep::Creating,
                &policies.persistence,
                timeouts.create_placeholder,
                || executors.create_placeholder(request),
            )
            .await
        {
            Ok(recipe) => recipe,
            Err(e) => {
                let recipe_id = recipe_id_for_run(&request.run_id);
                return self.fail(GenerationStep::Creating, recipe_id, e).await;
            }
        };

        let recipe_id = recipe.id;
        self.progress.set_recipe(recipe_id);
        if recipe.state.is_terminal() {
            info!(%recipe_id, step = %recipe.state.step, "Entity already terminal, not re-running");
            self.progress.enter(recipe.state.step);
            return WorkflowOutcome::from_terminal(recipe);
        }

        let draft = match self
            .step(
                GenerationStep::Generating,
                &policies.generative,
                timeouts.generate,
                || executors.generate_content(recipe_id, request),
            )
            .await
        {
            Ok(draft) => draft,
            Err(e) => return self.fail(GenerationStep::Generating, recipe_id, e).await,
        };

        let review = match self
            .step(
                GenerationStep::Reviewing,
                &policies.generative,
                timeouts.review,
                || executors.review_quality(&request.run_id, recipe_id, &draft),
            )
            .await
        {
            Ok(review) => review,
            Err(e) => return self.fail(GenerationStep::Reviewing, recipe_id, e).await,
        };

        let final_draft = match self
            .step(
                GenerationStep::Fixing,
                &policies.generative,
                timeouts.fix,
                || executors.fix_issues(&request.run_id, recipe_id, &draft, &review),
            )
            .await
        {
            Ok(fixed) => fixed,
            Err(e) => {
                warn!(error = %e.summary(), "Fix step failed, continuing with the unfixed draft");
                draft.clone()
            }
        };

        match self
            .step(
                GenerationStep::Saving,
                &policies.persistence,
                timeouts.finalize,
                || executors.finalize(recipe_id, &final_draft),
            )
            .await
        {
            Ok(recipe) => {
                self.progress.enter(GenerationStep::Completed);
                info!(%recipe_id, name = ?recipe.name, "Run completed");
                WorkflowOutcome::Completed {
                    recipe: Box::new(recipe),
                }
            }
            Err(e) => self.fail(GenerationStep::Saving, recipe_id, e).await,
        }
    }

    async fn step<T, F, Fut>(
        &self,
        step: GenerationStep,
        policy: &RetryPolicy,
        timeout: Duration,
        action: F,
    ) -> EscoffierResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EscoffierResult<T>>,
    {
        self.progress.enter(step);
        self.context.runner.run(step, policy, timeout, action).await
    }

    /// Record the failure on the entity, retrying under the persistence
    /// policy.
    ///
    /// A missing entity counts as recorded: the closed queue entry carries
    /// the failure instead.
    async fn fail(
        &self,
        failed_step: GenerationStep,
        recipe_id: Uuid,
        cause: EscoffierError,
    ) -> WorkflowOutcome {
        let message = format!("Failed at {failed_step}: {}", cause.summary());
        error!(%failed_step, error = %message, "Run failed");
        self.progress.set_error(&message);
        self.progress.enter(GenerationStep::Failed);

        let executors = &self.context.executors;
        let result = self
            .context
            .runner
            .run(
                GenerationStep::Failed,
                &self.context.policies.persistence,
                self.context.timeouts.mark_failed,
                || executors.mark_failed(recipe_id, failed_step, &message),
            )
            .await;
        let recorded = match result {
            Ok(_) => true,
            Err(e) if e.is_not_found() => {
                debug!(%recipe_id, "No entity to mark failed");
                true
            }
            Err(e) => {
                error!(error = %e.summary(), "Could not record failure, run stays claimed");
                false
            }
        };

        WorkflowOutcome::Failed {
            recipe_id,
            failed_step,
            error: message,
            recorded,
        }
    }
}
