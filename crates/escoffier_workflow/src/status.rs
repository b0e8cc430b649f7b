//! Status answers rebuilt from persisted state.

use escoffier_core::{
    GenerateStatus, GenerationStatus, GenerationStatusReport, GenerationStep, QueueState,
    QueuedRun, Recipe,
};
use escoffier_error::{EscoffierResult, WorkflowError, WorkflowErrorKind};
use escoffier_interface::{RecipeRepository, RunQueue};
use std::sync::Arc;
use tracing::instrument;

/// Read side of the pipeline.
///
/// Answers come only from the recipe store and the run queue, never from
/// coordinator memory, so they survive restarts and are the same on every
/// process.
#[derive(Clone)]
pub struct StatusProjection {
    recipes: Arc<dyn RecipeRepository>,
    queue: Arc<dyn RunQueue>,
}

impl std::fmt::Debug for StatusProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusProjection").finish_non_exhaustive()
    }
}

impl StatusProjection {
    /// Projection over the given stores.
    pub fn new(recipes: Arc<dyn RecipeRepository>, queue: Arc<dyn RunQueue>) -> Self {
        Self { recipes, queue }
    }

    /// Status of a run, or of every run in a batch sharing the id prefix.
    ///
    /// Any failed run makes the batch failed. The batch is completed once
    /// every queued run has a completed recipe. Otherwise the most recently
    /// updated in-flight recipe decides. An id nothing matches is reported
    /// pending.
    #[instrument(skip(self))]
    pub async fn get_status(&self, id: &str) -> EscoffierResult<GenerationStatusReport> {
        if id.trim().is_empty() {
            return Err(WorkflowError::new(WorkflowErrorKind::InvalidRequest(
                "run id must not be empty".to_string(),
            ))
            .into());
        }

        let recipes = self.recipes.find_by_run_prefix(id).await?;
        let runs = self.queue.find_by_prefix(id).await?;
        Ok(project(id, recipes, &runs))
    }
}

fn project(id: &str, recipes: Vec<Recipe>, runs: &[QueuedRun]) -> GenerationStatusReport {
    let mut report = GenerationStatusReport {
        run_id: id.to_string(),
        status: GenerateStatus::Pending,
        current_step: GenerationStep::Queued,
        recipes: None,
        error: None,
    };

    if let Some(failed) = recipes.iter().find(|recipe| is_failed(recipe)) {
        report.status = GenerateStatus::Failed;
        report.current_step = failed.state.failed_step.unwrap_or(failed.state.step);
        report.error = failed.state.error.clone();
        return report;
    }

    let without_recipe: Vec<&QueuedRun> = runs
        .iter()
        .filter(|run| !recipes.iter().any(|recipe| recipe.run_id == run.run_id))
        .collect();

    // A closed queue entry wins over an entity that never reached a terminal step.
    let failed_in_queue = runs
        .iter()
        .filter(|run| run.state == QueueState::Failed)
        .map(|run| {
            let recipe = recipes.iter().find(|recipe| recipe.run_id == run.run_id);
            (run, recipe)
        })
        .find(|(_, recipe)| recipe.is_none_or(|recipe| !recipe.state.is_terminal()));
    if let Some((failed, recipe)) = failed_in_queue {
        report.status = GenerateStatus::Failed;
        report.current_step = recipe
            .map(|recipe| recipe.state.step)
            .filter(|step| *step != GenerationStep::Queued)
            .unwrap_or(GenerationStep::Creating);
        report.error = failed.error.clone();
        return report;
    }

    let all_completed = recipes
        .iter()
        .all(|recipe| recipe.state.step == GenerationStep::Completed);
    if !recipes.is_empty() && all_completed && without_recipe.is_empty() {
        report.status = GenerateStatus::Completed;
        report.current_step = GenerationStep::Completed;
        report.recipes = Some(recipes);
        return report;
    }

    if let Some(latest) = recipes
        .iter()
        .filter(|recipe| !recipe.state.is_terminal())
        .max_by_key(|recipe| recipe.state.updated_at)
    {
        report.status = latest.state.step.into();
        report.current_step = latest.state.step;
    }
    report
}

fn is_failed(recipe: &Recipe) -> bool {
    recipe.state.step == GenerationStep::Failed || recipe.state.status == GenerationStatus::Failed
}
