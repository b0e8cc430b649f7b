//! Run submission command handler.

use escoffier::{EscoffierConfig, Stores, runtime};
use escoffier_core::{GenerateStatus, GenerationStatusReport};
use escoffier_error::{EscoffierResult, JsonError, WorkflowError, WorkflowErrorKind};
use escoffier_workflow::{GenerationService, StartRunRequest};
use std::time::Duration;
use tracing::{debug, info};

/// What to generate and how to wait for it.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Requesting user id
    pub user: String,
    /// Description of the dish
    pub prompt: String,
    /// Ingredients the recipes must use
    pub ingredients: Vec<String>,
    /// Dietary restrictions
    pub dietary_restrictions: Vec<String>,
    /// Number of runs
    pub amount: u8,
    /// Block until every run is terminal
    pub wait: bool,
    /// In-process worker with in-memory stores
    pub local: bool,
}

impl GenerateOptions {
    fn start_request(&self) -> EscoffierResult<StartRunRequest> {
        StartRunRequest::builder()
            .user_id(self.user.clone())
            .prompt(self.prompt.clone())
            .ingredients(non_empty(&self.ingredients))
            .dietary_restrictions(non_empty(&self.dietary_restrictions))
            .amount(self.amount)
            .build()
            .map_err(|e| WorkflowError::new(WorkflowErrorKind::InvalidRequest(e.to_string())).into())
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

/// Handle the `generate` command
pub async fn handle_generate_command(
    config: &EscoffierConfig,
    options: GenerateOptions,
) -> EscoffierResult<()> {
    let request = options.start_request()?;

    if options.local {
        return generate_locally(config, request).await;
    }

    let stores = Stores::postgres(config).await?;
    let service = runtime::service(&stores);
    let started = service.start_run(request).await?;
    print_json(&started)?;

    if options.wait {
        let report = wait_for_terminal(&service, &started.run_id, config.worker.poll_interval())
            .await?;
        print_json(&report)?;
    }
    Ok(())
}

/// Start runs against an in-process worker and print the final status.
async fn generate_locally(
    config: &EscoffierConfig,
    request: StartRunRequest,
) -> EscoffierResult<()> {
    info!("Running locally with in-memory stores");
    let stores = Stores::in_memory();
    let driver = runtime::model_driver(config)?;
    let (worker, handle) = runtime::worker(config, &stores, driver);
    let worker_task = tokio::spawn(worker.run());

    let service = runtime::service(&stores).with_worker(handle.clone());
    let started = service.start_run(request).await?;
    print_json(&started)?;

    let report =
        wait_for_terminal(&service, &started.run_id, Duration::from_millis(500)).await?;
    print_json(&report)?;

    handle.shutdown().await?;
    worker_task
        .await
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::Join(e.to_string())))??;
    Ok(())
}

/// Poll `GetStatus` until the run or batch is completed or failed.
pub async fn wait_for_terminal(
    service: &GenerationService,
    id: &str,
    every: Duration,
) -> EscoffierResult<GenerationStatusReport> {
    loop {
        let report = service.get_status(id).await?;
        if matches!(
            report.status,
            GenerateStatus::Completed | GenerateStatus::Failed
        ) {
            return Ok(report);
        }
        debug!(%id, status = %report.status, step = %report.current_step, "Waiting");
        tokio::time::sleep(every).await;
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> EscoffierResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(JsonError::from)?;
    println!("{json}");
    Ok(())
}
