//! Inbound entry points: start runs and query their status.

use crate::{StatusProjection, WorkerHandle};
use derive_builder::Builder;
use escoffier_core::{GenerationRequest, GenerationStatusReport};
use escoffier_error::{EscoffierResult, WorkflowError, WorkflowErrorKind};
use escoffier_interface::RunQueue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Most recipes a single start request may ask for.
pub const MAX_AMOUNT: u8 = 5;

/// Prefix of every generated run id.
pub const RUN_ID_PREFIX: &str = "recipe-gen-";

/// A request to start one or more runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct StartRunRequest {
    /// Requesting user
    pub user_id: String,
    /// Free-text description of the dish
    pub prompt: String,
    /// Ingredients the recipes must use
    #[builder(default)]
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    /// Dietary restrictions to follow
    #[builder(default)]
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<String>>,
    /// How many independent recipes to generate, 1 to 5
    #[builder(default = "1")]
    #[serde(default = "default_amount")]
    pub amount: u8,
}

fn default_amount() -> u8 {
    1
}

impl StartRunRequest {
    /// Create a builder for a start request.
    pub fn builder() -> StartRunRequestBuilder {
        StartRunRequestBuilder::default()
    }

    fn validate(&self) -> EscoffierResult<()> {
        let invalid = |message: String| -> EscoffierResult<()> {
            Err(WorkflowError::new(WorkflowErrorKind::InvalidRequest(message)).into())
        };
        if !(1..=MAX_AMOUNT).contains(&self.amount) {
            return invalid(format!(
                "amount must be between 1 and {MAX_AMOUNT}, got {}",
                self.amount
            ));
        }
        if self.prompt.trim().is_empty() {
            return invalid("prompt must not be empty".to_string());
        }
        if self.user_id.trim().is_empty() {
            return invalid("user_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Ids of the runs a start request launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedRuns {
    /// Shared id; pass it to `get_status` to see the whole batch
    pub run_id: String,
    /// One id per run
    pub run_ids: Vec<String>,
}

/// `StartRun` and `GetStatus` over a run queue and the status projection.
#[derive(Clone)]
pub struct GenerationService {
    queue: Arc<dyn RunQueue>,
    projection: StatusProjection,
    worker: Option<WorkerHandle>,
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("worker", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl GenerationService {
    /// Service over the given queue and projection.
    pub fn new(queue: Arc<dyn RunQueue>, projection: StatusProjection) -> Self {
        Self {
            queue,
            projection,
            worker: None,
        }
    }

    /// Nudge an in-process worker whenever runs are enqueued.
    pub fn with_worker(mut self, worker: WorkerHandle) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Enqueue `amount` independent runs sharing a base id.
    ///
    /// A single run uses the base id itself; a batch uses `<base>-<i>`.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, amount = request.amount))]
    pub async fn start_run(&self, request: StartRunRequest) -> EscoffierResult<StartedRuns> {
        request.validate()?;

        let base = new_run_id();
        let run_ids: Vec<String> = if request.amount == 1 {
            vec![base.clone()]
        } else {
            (0..request.amount).map(|i| format!("{base}-{i}")).collect()
        };

        for run_id in &run_ids {
            let generation = GenerationRequest {
                run_id: run_id.clone(),
                user_id: request.user_id.clone(),
                prompt: request.prompt.clone(),
                ingredients: request.ingredients.clone(),
                dietary_restrictions: request.dietary_restrictions.clone(),
            };
            self.queue.enqueue(&generation).await?;
            debug!(%run_id, "Run enqueued");
        }
        info!(run_id = %base, count = run_ids.len(), "Runs started");

        if let Some(worker) = &self.worker
            && let Err(e) = worker.poll_now().await
        {
            debug!(error = %e.summary(), "Worker not listening, runs wait for the next poll");
        }

        Ok(StartedRuns {
            run_id: base,
            run_ids,
        })
    }

    /// Status of a run or batch.
    pub async fn get_status(&self, id: &str) -> EscoffierResult<GenerationStatusReport> {
        self.projection.get_status(id).await
    }
}

/// `recipe-gen-` followed by 12 hex characters.
pub fn new_run_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{RUN_ID_PREFIX}{}", &hex[..12])
}
