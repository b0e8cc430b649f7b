//! Wiring collaborators into a runnable pipeline.

use crate::EscoffierConfig;
use escoffier_database::{
    PostgresCallLog, PostgresRecipeRepository, PostgresRunQueue, establish_pool, run_migrations,
};
use escoffier_error::{EscoffierResult, WorkflowError, WorkflowErrorKind};
use escoffier_interface::{CallLogSink, EscoffierDriver, RecipeRepository, RunQueue};
use escoffier_models::{GenerationClient, OpenAiCompatDriver};
use escoffier_workflow::{
    GenerationService, InMemoryCallLog, InMemoryRecipeRepository, InMemoryRunQueue,
    StatusProjection, StepExecutors, StepRunner, WorkerHandle, WorkerRuntime, WorkflowContext,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Where recipes, call logs and queued runs live.
#[derive(Clone)]
pub struct Stores {
    /// Recipe entities
    pub recipes: Arc<dyn RecipeRepository>,
    /// Model call log
    pub call_log: Arc<dyn CallLogSink>,
    /// Durable run queue
    pub queue: Arc<dyn RunQueue>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// PostgreSQL-backed stores.
    #[instrument(skip(config))]
    pub async fn postgres(config: &EscoffierConfig) -> EscoffierResult<Self> {
        let url = config.database.database_url()?;
        let pool_size = config.database.pool_size;
        let pool = blocking(move || establish_pool(&url, pool_size).map_err(Into::into)).await?;
        info!(pool_size, "Database pool ready");

        Ok(Self {
            recipes: Arc::new(PostgresRecipeRepository::new(pool.clone())),
            call_log: Arc::new(PostgresCallLog::new(pool.clone())),
            queue: Arc::new(PostgresRunQueue::new(pool)),
        })
    }

    /// Process-local stores; nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            recipes: Arc::new(InMemoryRecipeRepository::new()),
            call_log: Arc::new(InMemoryCallLog::new()),
            queue: Arc::new(InMemoryRunQueue::new()),
        }
    }

    /// Status projection over these stores.
    pub fn projection(&self) -> StatusProjection {
        StatusProjection::new(Arc::clone(&self.recipes), Arc::clone(&self.queue))
    }
}

/// Driver for the configured model server.
pub fn model_driver(config: &EscoffierConfig) -> EscoffierResult<Arc<dyn EscoffierDriver>> {
    let driver = OpenAiCompatDriver::new(&config.model.driver_settings()?)?;
    info!(endpoint = driver.endpoint(), model = %config.model.model, "Model driver ready");
    Ok(Arc::new(driver))
}

/// Executors, concurrency limits, retry policies and timeouts for runs.
pub fn workflow_context(
    config: &EscoffierConfig,
    stores: &Stores,
    driver: Arc<dyn EscoffierDriver>,
) -> Arc<WorkflowContext> {
    let client =
        GenerationClient::new(driver).with_reformulation_retries(config.model.reformulation_retries);
    let executors = StepExecutors::new(
        Arc::clone(&stores.recipes),
        Arc::clone(&stores.call_log),
        client,
    );
    let runner = StepRunner::new(config.worker.max_concurrent_activities);

    Arc::new(
        WorkflowContext::new(executors, runner)
            .with_policies(config.retry.into())
            .with_timeouts(config.timeouts.into()),
    )
}

/// A worker over `stores`, not yet started.
pub fn worker(
    config: &EscoffierConfig,
    stores: &Stores,
    driver: Arc<dyn EscoffierDriver>,
) -> (WorkerRuntime, WorkerHandle) {
    let context = workflow_context(config, stores, driver);
    WorkerRuntime::new(config.worker.clone(), context, Arc::clone(&stores.queue))
}

/// The inbound service over `stores`.
pub fn service(stores: &Stores) -> GenerationService {
    GenerationService::new(Arc::clone(&stores.queue), stores.projection())
}

/// Apply pending migrations, returning the versions applied.
#[instrument(skip(config))]
pub async fn migrate(config: &EscoffierConfig) -> EscoffierResult<Vec<String>> {
    let url = config.database.database_url()?;
    blocking(move || {
        let pool = establish_pool(&url, 1)?;
        let mut conn = pool.get().map_err(escoffier_error::DatabaseError::from)?;
        Ok(run_migrations(&mut conn)?)
    })
    .await
}

async fn blocking<T, F>(op: F) -> EscoffierResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> EscoffierResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::Join(e.to_string())))?
}
