//! Recipe repository that can fail on demand and records step history.

use async_trait::async_trait;
use escoffier_core::{
    FinalizedRecipe, GenerationStateUpdate, GenerationStep, NewRecipePlaceholder, Recipe,
};
use escoffier_error::{DatabaseError, DatabaseErrorKind, EscoffierResult};
use escoffier_interface::RecipeRepository;
use escoffier_workflow::InMemoryRecipeRepository;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Wraps the in-memory repository with injectable transient failures.
#[derive(Debug, Default)]
pub struct FlakyRecipeRepository {
    inner: InMemoryRecipeRepository,
    placeholder_failures: AtomicU32,
    finalize_failures: AtomicU32,
    failure_record_failures: AtomicU32,
    creating_failures: AtomicU32,
    history: Mutex<Vec<GenerationStep>>,
}

impl FlakyRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` placeholder inserts with a connection error.
    pub fn fail_placeholders(&self, n: u32) {
        self.placeholder_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` finalize calls with a connection error.
    pub fn fail_finalizes(&self, n: u32) {
        self.finalize_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes that move a fresh entity to creating.
    pub fn fail_creating_marks(&self, n: u32) {
        self.creating_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes that move a run to failed.
    pub fn fail_failure_records(&self, n: u32) {
        self.failure_record_failures.store(n, Ordering::SeqCst);
    }

    /// Stored step after every successful write, in order.
    pub fn step_history(&self) -> Vec<GenerationStep> {
        self.history.lock().clone()
    }

    pub fn all(&self) -> Vec<Recipe> {
        self.inner.all()
    }

    fn record(&self, recipe: &Recipe) {
        self.history.lock().push(recipe.state.step);
    }
}

fn take_failure(counter: &AtomicU32) -> EscoffierResult<()> {
    let injected = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if injected {
        return Err(DatabaseError::new(DatabaseErrorKind::Connection(
            "injected connection reset".to_string(),
        ))
        .into());
    }
    Ok(())
}

#[async_trait]
impl RecipeRepository for FlakyRecipeRepository {
    async fn create_placeholder(
        &self,
        placeholder: &NewRecipePlaceholder,
    ) -> EscoffierResult<Recipe> {
        take_failure(&self.placeholder_failures)?;
        let recipe = self.inner.create_placeholder(placeholder).await?;
        self.record(&recipe);
        Ok(recipe)
    }

    async fn get_recipe(&self, id: uuid::Uuid) -> EscoffierResult<Option<Recipe>> {
        self.inner.get_recipe(id).await
    }

    async fn find_by_run_prefix(&self, prefix: &str) -> EscoffierResult<Vec<Recipe>> {
        self.inner.find_by_run_prefix(prefix).await
    }

    async fn update_generation_state(
        &self,
        id: uuid::Uuid,
        update: &GenerationStateUpdate,
    ) -> EscoffierResult<Recipe> {
        match update.step {
            Some(GenerationStep::Failed) => take_failure(&self.failure_record_failures)?,
            Some(GenerationStep::Creating) => take_failure(&self.creating_failures)?,
            _ => {}
        }
        let recipe = self.inner.update_generation_state(id, update).await?;
        self.record(&recipe);
        Ok(recipe)
    }

    async fn finalize_recipe(
        &self,
        id: uuid::Uuid,
        recipe: &FinalizedRecipe,
    ) -> EscoffierResult<Recipe> {
        take_failure(&self.finalize_failures)?;
        let stored = self.inner.finalize_recipe(id, recipe).await?;
        self.record(&stored);
        Ok(stored)
    }
}
