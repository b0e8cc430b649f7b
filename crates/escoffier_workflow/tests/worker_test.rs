//! Worker runtime and service tests over the in-memory queue.

mod test_utils;

use escoffier_core::{GenerateStatus, GenerationStatusReport, GenerationStep, QueueState};
use escoffier_error::{EscoffierErrorKind, WorkflowErrorKind};
use escoffier_interface::RunQueue;
use escoffier_workflow::{
    GenerationService, RUN_ID_PREFIX, StartRunRequest, WorkerHandle, WorkerRuntime,
    WorkerSettings,
};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{Harness, Route, breakfast_request, happy_driver};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

fn settings(worker_id: &str) -> WorkerSettings {
    WorkerSettings {
        worker_id: Some(worker_id.to_string()),
        poll_interval_ms: 50,
        ..WorkerSettings::default()
    }
}

fn start_worker(
    harness: &Harness,
    worker_id: &str,
) -> (WorkerHandle, JoinHandle<escoffier_error::EscoffierResult<()>>) {
    start_worker_with(harness, settings(worker_id))
}

fn start_worker_with(
    harness: &Harness,
    settings: WorkerSettings,
) -> (WorkerHandle, JoinHandle<escoffier_error::EscoffierResult<()>>) {
    let expected_id = settings.worker_id();
    let (worker, handle) =
        WorkerRuntime::new(settings, harness.context.clone(), harness.queue.clone());
    assert_eq!(worker.worker_id(), expected_id);
    (handle, tokio::spawn(worker.run()))
}

fn two_breakfasts() -> StartRunRequest {
    StartRunRequest::builder()
        .user_id("user_1")
        .prompt("quick breakfast with eggs")
        .amount(2u8)
        .build()
        .expect("valid request")
}

async fn wait_for_terminal(service: &GenerationService, id: &str) -> GenerationStatusReport {
    for _ in 0..200 {
        let report = service.get_status(id).await.expect("status");
        if matches!(
            report.status,
            GenerateStatus::Completed | GenerateStatus::Failed
        ) {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("run {id} never finished");
}

#[tokio::test(start_paused = true)]
async fn test_batch_runs_to_completion() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(true));
    let (handle, worker) = start_worker(&harness, "worker-a");
    let service = GenerationService::new(harness.queue.clone(), harness.projection())
        .with_worker(handle.clone());

    let started = service
        .start_run(
            StartRunRequest::builder()
                .user_id("user_1")
                .prompt("quick breakfast with eggs")
                .amount(3u8)
                .build()?,
        )
        .await?;

    assert!(started.run_id.starts_with(RUN_ID_PREFIX));
    assert_eq!(started.run_id.len(), RUN_ID_PREFIX.len() + 12);
    assert_eq!(
        started.run_ids,
        (0..3)
            .map(|i| format!("{}-{i}", started.run_id))
            .collect::<Vec<_>>()
    );

    let report = wait_for_terminal(&service, &started.run_id).await;
    assert_eq!(report.status, GenerateStatus::Completed);
    assert_eq!(report.current_step, GenerationStep::Completed);
    assert_eq!(report.recipes.map(|recipes| recipes.len()), Some(3));

    handle.shutdown().await?;
    worker.await??;

    for run_id in &started.run_ids {
        let queued = harness.queue.get(run_id).expect("queued run");
        assert_eq!(queued.state, QueueState::Done);
        assert_eq!(queued.dispatch_count, 1);
    }
    assert_eq!(harness.driver.calls(Route::Generate), 3);
    assert!(handle.in_flight().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_single_run_uses_base_id() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(false));
    let (handle, worker) = start_worker(&harness, "worker-a");
    let service = GenerationService::new(harness.queue.clone(), harness.projection())
        .with_worker(handle.clone());

    let started = service
        .start_run(
            StartRunRequest::builder()
                .user_id("user_1")
                .prompt("tomato soup")
                .dietary_restrictions(Some(vec!["vegan".to_string()]))
                .build()?,
        )
        .await?;
    assert_eq!(started.run_ids, vec![started.run_id.clone()]);

    let report = wait_for_terminal(&service, &started.run_id).await;
    assert_eq!(report.status, GenerateStatus::Completed);
    assert!(report.error.is_none());

    handle.shutdown().await?;
    worker.await??;
    Ok(())
}

#[tokio::test]
async fn test_start_run_rejects_invalid_amounts() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(false));
    let service = GenerationService::new(harness.queue.clone(), harness.projection());

    for amount in [0u8, 6u8] {
        let request = StartRunRequest::builder()
            .user_id("user_1")
            .prompt("pancakes")
            .amount(amount)
            .build()?;
        let err = service
            .start_run(request)
            .await
            .expect_err("amount out of range");
        assert!(matches!(
            err.kind(),
            EscoffierErrorKind::Workflow(e) if matches!(e.kind, WorkflowErrorKind::InvalidRequest(_))
        ));
    }
    assert!(harness.queue.find_by_prefix(RUN_ID_PREFIX).await?.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_restarted_worker_reclaims_its_runs() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(false));
    harness.queue.enqueue(&breakfast_request("run-orphaned")).await?;
    let claimed = harness
        .queue
        .claim("worker-a", Duration::from_secs(300), 10)
        .await?;
    assert_eq!(claimed.len(), 1);

    let (handle, worker) = start_worker(&harness, "worker-a");
    let service = GenerationService::new(harness.queue.clone(), harness.projection());

    let report = wait_for_terminal(&service, "run-orphaned").await;
    assert_eq!(report.status, GenerateStatus::Completed);

    handle.shutdown().await?;
    worker.await??;

    let queued = harness.queue.get("run-orphaned").expect("queued run");
    assert_eq!(queued.state, QueueState::Done);
    assert_eq!(queued.claimed_by.as_deref(), Some("worker-a"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_leased_run_is_not_taken_by_another_worker() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(false));
    harness.queue.enqueue(&breakfast_request("run-leased")).await?;
    harness
        .queue
        .claim("worker-a", Duration::from_secs(300), 10)
        .await?;

    let (handle, worker) = start_worker(&harness, "worker-b");
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(harness.driver.calls(Route::Generate), 0);
    let report = harness.projection().get_status("run-leased").await?;
    assert_eq!(report.status, GenerateStatus::Pending);

    handle.shutdown().await?;
    worker.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_with_no_work_returns_promptly() -> anyhow::Result<()> {
    let harness = Harness::new(happy_driver(false));
    let (handle, worker) = start_worker(&harness, "worker-idle");

    handle.shutdown().await?;
    worker.await??;

    assert!(handle.poll_now().await.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_workflow_ceiling_holds_second_run_until_first_finishes() -> anyhow::Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::with_activity_slots(happy_driver(false).gated(gate.clone()), 1);
    let (handle, worker) = start_worker_with(
        &harness,
        WorkerSettings {
            max_concurrent_workflow_tasks: 1,
            max_concurrent_activities: 1,
            ..settings("worker-narrow")
        },
    );
    let service = GenerationService::new(harness.queue.clone(), harness.projection());

    let started = service.start_run(two_breakfasts()).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let running = handle.in_flight();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].current_step, GenerationStep::Generating);
    assert_eq!(harness.context.runner().available_slots(), 0);
    assert_eq!(harness.driver.calls(Route::Generate), 1);
    let waiting: Vec<_> = started
        .run_ids
        .iter()
        .filter(|run_id| **run_id != running[0].run_id)
        .collect();
    assert_eq!(waiting.len(), 1);
    assert_eq!(
        harness.queue.get(waiting[0]).map(|run| run.state),
        Some(QueueState::Pending)
    );

    gate.add_permits(16);
    for _ in 0..200 {
        assert!(handle.in_flight().len() <= 1);
        let report = service.get_status(&started.run_id).await?;
        if report.status == GenerateStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let report = service.get_status(&started.run_id).await?;
    assert_eq!(report.status, GenerateStatus::Completed);
    assert_eq!(report.recipes.map(|recipes| recipes.len()), Some(2));
    assert_eq!(harness.driver.calls(Route::Generate), 2);
    assert_eq!(harness.context.runner().available_slots(), 1);

    handle.shutdown().await?;
    worker.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_activity_ceiling_is_shared_across_runs() -> anyhow::Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::with_activity_slots(happy_driver(false).gated(gate.clone()), 1);
    let (handle, worker) = start_worker_with(
        &harness,
        WorkerSettings {
            max_concurrent_workflow_tasks: 2,
            max_concurrent_activities: 1,
            ..settings("worker-one-slot")
        },
    );
    let service = GenerationService::new(harness.queue.clone(), harness.projection());

    let started = service.start_run(two_breakfasts()).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(handle.in_flight().len(), 2);
    assert_eq!(harness.context.runner().available_slots(), 0);
    assert_eq!(harness.driver.calls(Route::Generate), 1);

    gate.add_permits(16);
    let report = wait_for_terminal(&service, &started.run_id).await;
    assert_eq!(report.status, GenerateStatus::Completed);
    assert_eq!(harness.driver.calls(Route::Generate), 2);

    handle.shutdown().await?;
    worker.await??;
    Ok(())
}
