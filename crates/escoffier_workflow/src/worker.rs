//! Long-lived worker that claims queued runs and executes them.

use crate::{
    ProgressHandle, RecipeGenerationWorkflow, WorkerSettings, WorkflowContext, WorkflowOutcome,
};
use escoffier_core::{QueuedRun, RunProgress};
use escoffier_error::{EscoffierResult, WorkflowError, WorkflowErrorKind};
use escoffier_interface::RunQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

/// Message types for the worker runtime.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Look for claimable runs now instead of waiting for the next tick
    Poll,
    /// Stop claiming, let in-flight runs finish, then exit
    Shutdown,
}

type InFlight = Arc<RwLock<HashMap<String, ProgressHandle>>>;
type RunResult = (String, EscoffierResult<WorkflowOutcome>);

/// Control and progress handle for a running [`WorkerRuntime`].
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    in_flight: InFlight,
}

impl WorkerHandle {
    /// Ask the worker to poll immediately.
    pub async fn poll_now(&self) -> EscoffierResult<()> {
        self.send(WorkerMessage::Poll).await
    }

    /// Ask the worker to shut down gracefully.
    pub async fn shutdown(&self) -> EscoffierResult<()> {
        self.send(WorkerMessage::Shutdown).await
    }

    /// Progress of a run executing on this worker.
    pub fn progress(&self, run_id: &str) -> Option<RunProgress> {
        self.in_flight.read().get(run_id).map(ProgressHandle::snapshot)
    }

    /// Progress of every run executing on this worker.
    pub fn in_flight(&self) -> Vec<RunProgress> {
        let mut runs: Vec<_> = self
            .in_flight
            .read()
            .values()
            .map(ProgressHandle::snapshot)
            .collect();
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        runs
    }

    async fn send(&self, message: WorkerMessage) -> EscoffierResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| WorkflowError::new(WorkflowErrorKind::QueueClosed).into())
    }
}

/// Pulls runs from a [`RunQueue`] and executes them with bounded
/// concurrency.
///
/// Each run id executes at most once at a time on a worker, and the queue's
/// lease keeps other workers off it. On start the worker reclaims runs it
/// still holds from a previous life before claiming new ones.
pub struct WorkerRuntime {
    worker_id: String,
    settings: WorkerSettings,
    context: Arc<WorkflowContext>,
    queue: Arc<dyn RunQueue>,
    rx: mpsc::Receiver<WorkerMessage>,
    in_flight: InFlight,
    slots: Arc<Semaphore>,
    tasks: JoinSet<RunResult>,
}

impl WorkerRuntime {
    /// Create a worker and the handle that controls it.
    pub fn new(
        settings: WorkerSettings,
        context: Arc<WorkflowContext>,
        queue: Arc<dyn RunQueue>,
    ) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(32);
        let in_flight: InFlight = Arc::default();
        let worker = Self {
            worker_id: settings.worker_id(),
            slots: Arc::new(Semaphore::new(settings.max_concurrent_workflow_tasks.max(1))),
            settings,
            context,
            queue,
            rx,
            in_flight: Arc::clone(&in_flight),
            tasks: JoinSet::new(),
        };
        (worker, WorkerHandle { tx, in_flight })
    }

    /// Identity used for claims.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Runs the worker loop until shutdown, then drains in-flight runs.
    #[instrument(skip(self), fields(worker_id = %self.worker_id, task_queue = %self.settings.task_queue))]
    pub async fn run(mut self) -> EscoffierResult<()> {
        info!("Worker runtime started");

        let lease = self.settings.lease();
        let resumed = self.queue.reclaim(&self.worker_id, lease).await?;
        if !resumed.is_empty() {
            info!(count = resumed.len(), "Resuming runs claimed before restart");
        }
        for run in resumed {
            self.dispatch(run);
        }

        let mut poll = interval(self.settings.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut renew = interval(renew_period(lease));
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(WorkerMessage::Poll) => self.poll().await,
                    Some(WorkerMessage::Shutdown) | None => {
                        info!("Worker runtime shutting down");
                        break;
                    }
                },
                _ = poll.tick() => self.poll().await,
                _ = renew.tick() => self.renew().await,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.settle(joined).await;
                }
            }
        }

        if !self.tasks.is_empty() {
            info!(count = self.tasks.len(), "Waiting for in-flight runs");
        }
        while !self.tasks.is_empty() {
            tokio::select! {
                Some(joined) = self.tasks.join_next() => self.settle(joined).await,
                _ = renew.tick() => self.renew().await,
            }
        }

        info!("Worker runtime stopped");
        Ok(())
    }

    async fn poll(&mut self) {
        let free = self.slots.available_permits();
        if free == 0 {
            debug!("All workflow slots busy");
            return;
        }

        match self
            .queue
            .claim(&self.worker_id, self.settings.lease(), free)
            .await
        {
            Ok(runs) => {
                for run in runs {
                    self.dispatch(run);
                }
            }
            Err(e) => warn!(error = %e.summary(), "Failed to claim runs"),
        }
    }

    fn dispatch(&mut self, run: QueuedRun) {
        let run_id = run.run_id.clone();
        if self.in_flight.read().contains_key(&run_id) {
            debug!(%run_id, "Run already executing here");
            return;
        }
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            debug!(%run_id, "No free workflow slot, leaving run for a later poll");
            return;
        };

        let workflow = RecipeGenerationWorkflow::new(Arc::clone(&self.context), run.request);
        self.in_flight.write().insert(run_id.clone(), workflow.progress());
        info!(%run_id, dispatch = run.dispatch_count, "Dispatching run");

        let in_flight = Arc::clone(&self.in_flight);
        self.tasks.spawn(async move {
            let outcome: EscoffierResult<WorkflowOutcome> = tokio::spawn(workflow.run())
                .await
                .map_err(|e| WorkflowError::new(WorkflowErrorKind::Join(e.to_string())).into());
            // The slot frees only after the run leaves the in-flight view.
            in_flight.write().remove(&run_id);
            drop(permit);
            (run_id, outcome)
        });
    }

    async fn settle(&mut self, joined: Result<RunResult, JoinError>) {
        let (run_id, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "Run supervisor task failed");
                return;
            }
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%run_id, error = %e.summary(), "Run aborted, leaving it for re-dispatch");
                return;
            }
        };

        if !outcome.is_settled() {
            warn!(%run_id, "Run failure not recorded, leaving it for re-dispatch");
            return;
        }
        if let Err(e) = self.queue.complete(&run_id, outcome.error()).await {
            warn!(%run_id, error = %e.summary(), "Failed to close queue entry");
        }
    }

    async fn renew(&self) {
        let run_ids: Vec<String> = self.in_flight.read().keys().cloned().collect();
        if run_ids.is_empty() {
            return;
        }
        if let Err(e) = self
            .queue
            .renew(&self.worker_id, &run_ids, self.settings.lease())
            .await
        {
            warn!(error = %e.summary(), count = run_ids.len(), "Failed to renew leases");
        }
    }
}

fn renew_period(lease: Duration) -> Duration {
    (lease / 3).max(Duration::from_millis(100))
}
