//! Worker command handler.

use escoffier::{EscoffierConfig, Stores, runtime};
use escoffier_error::{EscoffierResult, WorkflowError, WorkflowErrorKind};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

const PROGRESS_EVERY: Duration = Duration::from_secs(30);

/// Handle the `worker` command
pub async fn handle_worker_command(config: &EscoffierConfig) -> EscoffierResult<()> {
    info!(task_queue = %config.worker.task_queue, "Starting worker");

    let stores = Stores::postgres(config).await?;
    let driver = runtime::model_driver(config)?;
    let (worker, handle) = runtime::worker(config, &stores, driver);
    info!(worker_id = worker.worker_id(), "Worker starting. Press Ctrl+C to stop.");

    let mut worker_task = tokio::spawn(worker.run());
    let mut progress = interval(PROGRESS_EVERY);
    progress.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let joined = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Could not listen for Ctrl+C, shutting down");
                }
                info!("Shutdown requested, waiting for in-flight runs");
                handle.shutdown().await?;
                break (&mut worker_task).await;
            }
            _ = progress.tick() => {
                for run in handle.in_flight() {
                    info!(
                        run_id = %run.run_id,
                        recipe_id = ?run.recipe_id,
                        step = %run.current_step,
                        progress = %format!("{}/{}", run.step_number(), run.total_steps()),
                        error = ?run.error,
                        "In flight"
                    );
                }
            }
            joined = &mut worker_task => break joined,
        }
    };

    joined.map_err(|e| WorkflowError::new(WorkflowErrorKind::Join(e.to_string())))??;
    info!("Worker stopped");
    Ok(())
}
