//! In-process implementations of the collaborator traits.
//!
//! Same semantics as the PostgreSQL versions, without durability. Used by
//! tests and by `escoffier generate --local`.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use escoffier_core::{
    CallLogEntry, FinalizeOutcome, FinalizedRecipe, GenerationRequest, GenerationStateUpdate,
    NewRecipePlaceholder, QueueState, QueuedRun, Recipe,
};
use escoffier_error::{
    DatabaseError, DatabaseErrorKind, EscoffierResult, WorkflowError, WorkflowErrorKind,
};
use escoffier_interface::{CallLogSink, RecipeRepository, RunQueue};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use uuid::Uuid;

/// Recipe entities held in a map.
#[derive(Debug, Default)]
pub struct InMemoryRecipeRepository {
    recipes: Mutex<HashMap<Uuid, Recipe>>,
}

impl InMemoryRecipeRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored entity, oldest first.
    pub fn all(&self) -> Vec<Recipe> {
        let mut recipes: Vec<_> = self.recipes.lock().values().cloned().collect();
        recipes.sort_by(|a, b| a.state.created_at.cmp(&b.state.created_at));
        recipes
    }
}

fn not_found(id: Uuid) -> escoffier_error::EscoffierError {
    WorkflowError::new(WorkflowErrorKind::RecipeNotFound(id.to_string())).into()
}

#[async_trait]
impl RecipeRepository for InMemoryRecipeRepository {
    async fn create_placeholder(
        &self,
        placeholder: &NewRecipePlaceholder,
    ) -> EscoffierResult<Recipe> {
        let mut recipes = self.recipes.lock();
        let recipe = recipes
            .entry(placeholder.id)
            .or_insert_with(|| Recipe::from_placeholder(placeholder.clone(), Utc::now()));
        Ok(recipe.clone())
    }

    async fn get_recipe(&self, id: Uuid) -> EscoffierResult<Option<Recipe>> {
        Ok(self.recipes.lock().get(&id).cloned())
    }

    async fn find_by_run_prefix(&self, prefix: &str) -> EscoffierResult<Vec<Recipe>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|recipe| recipe.run_id.starts_with(prefix))
            .collect())
    }

    async fn update_generation_state(
        &self,
        id: Uuid,
        update: &GenerationStateUpdate,
    ) -> EscoffierResult<Recipe> {
        let mut recipes = self.recipes.lock();
        let recipe = recipes.get_mut(&id).ok_or_else(|| not_found(id))?;
        recipe.state.apply(update, Utc::now());
        Ok(recipe.clone())
    }

    async fn finalize_recipe(
        &self,
        id: Uuid,
        finalized: &FinalizedRecipe,
    ) -> EscoffierResult<Recipe> {
        let mut recipes = self.recipes.lock();
        let recipe = recipes.get_mut(&id).ok_or_else(|| not_found(id))?;
        match recipe.finalize(finalized, Utc::now()) {
            FinalizeOutcome::Written | FinalizeOutcome::Unchanged => Ok(recipe.clone()),
            FinalizeOutcome::Rejected => Err(DatabaseError::new(DatabaseErrorKind::Conflict(
                format!("recipe {id} already failed"),
            ))
            .into()),
        }
    }
}

/// Call log kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCallLog {
    entries: Mutex<Vec<CallLogEntry>>,
}

impl InMemoryCallLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, in insertion order.
    pub fn entries(&self) -> Vec<CallLogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl CallLogSink for InMemoryCallLog {
    async fn append(&self, entry: &CallLogEntry) -> EscoffierResult<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn entries_for_run(&self, run_id: &str) -> EscoffierResult<Vec<CallLogEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.run_id == run_id)
            .cloned()
            .collect())
    }
}

/// Run queue ordered by run id.
#[derive(Debug, Default)]
pub struct InMemoryRunQueue {
    runs: Mutex<BTreeMap<String, QueuedRun>>,
}

impl InMemoryRunQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one run.
    pub fn get(&self, run_id: &str) -> Option<QueuedRun> {
        self.runs.lock().get(run_id).cloned()
    }
}

fn lease_expiry(lease: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(lease)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl RunQueue for InMemoryRunQueue {
    async fn enqueue(&self, request: &GenerationRequest) -> EscoffierResult<()> {
        self.runs
            .lock()
            .entry(request.run_id.clone())
            .or_insert_with(|| QueuedRun::pending(request.clone(), Utc::now()));
        Ok(())
    }

    async fn claim(
        &self,
        worker_id: &str,
        lease: Duration,
        limit: usize,
    ) -> EscoffierResult<Vec<QueuedRun>> {
        let now = Utc::now();
        let expires = lease_expiry(lease);
        let mut runs = self.runs.lock();

        let mut claimable: Vec<&mut QueuedRun> = runs
            .values_mut()
            .filter(|run| run.is_claimable(now))
            .collect();
        claimable.sort_by_key(|run| run.enqueued_at);

        Ok(claimable
            .into_iter()
            .take(limit)
            .map(|run| {
                run.state = QueueState::Claimed;
                run.claimed_by = Some(worker_id.to_string());
                run.lease_expires_at = Some(expires);
                run.dispatch_count += 1;
                run.clone()
            })
            .collect())
    }

    async fn reclaim(&self, worker_id: &str, lease: Duration) -> EscoffierResult<Vec<QueuedRun>> {
        let expires = lease_expiry(lease);
        Ok(self
            .runs
            .lock()
            .values_mut()
            .filter(|run| {
                run.state == QueueState::Claimed && run.claimed_by.as_deref() == Some(worker_id)
            })
            .map(|run| {
                run.lease_expires_at = Some(expires);
                run.dispatch_count += 1;
                run.clone()
            })
            .collect())
    }

    async fn renew(
        &self,
        worker_id: &str,
        run_ids: &[String],
        lease: Duration,
    ) -> EscoffierResult<()> {
        let expires = lease_expiry(lease);
        let mut runs = self.runs.lock();
        for run_id in run_ids {
            if let Some(run) = runs.get_mut(run_id)
                && run.state == QueueState::Claimed
                && run.claimed_by.as_deref() == Some(worker_id)
            {
                run.lease_expires_at = Some(expires);
            }
        }
        Ok(())
    }

    async fn complete(&self, run_id: &str, error: Option<&str>) -> EscoffierResult<()> {
        let mut runs = self.runs.lock();
        let run = runs.get_mut(run_id).ok_or_else(|| {
            WorkflowError::new(WorkflowErrorKind::RunNotFound(run_id.to_string()))
        })?;
        run.state = if error.is_some() {
            QueueState::Failed
        } else {
            QueueState::Done
        };
        run.error = error.map(str::to_string);
        run.lease_expires_at = None;
        Ok(())
    }

    async fn find_by_prefix(&self, prefix: &str) -> EscoffierResult<Vec<QueuedRun>> {
        Ok(self
            .runs
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(run_id, _)| run_id.starts_with(prefix))
            .map(|(_, run)| run.clone())
            .collect())
    }
}
