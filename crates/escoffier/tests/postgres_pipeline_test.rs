//! The wired pipeline against a live PostgreSQL.

#![cfg(feature = "database-tests")]

mod test_utils;

use escoffier::{Stores, runtime};
use escoffier_core::{GenerateStatus, GenerationStep};
use escoffier_workflow::StartRunRequest;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{CannedDriver, test_config};

#[tokio::test]
async fn test_postgres_pipeline_completes_run() -> anyhow::Result<()> {
    let config = test_config();
    runtime::migrate(&config).await?;

    let stores = Stores::postgres(&config).await?;
    let (worker, handle) = runtime::worker(&config, &stores, Arc::new(CannedDriver));
    let worker_task = tokio::spawn(worker.run());

    let service = runtime::service(&stores).with_worker(handle.clone());
    let started = service
        .start_run(
            StartRunRequest::builder()
                .user_id("user_1")
                .prompt("lentil soup")
                .build()?,
        )
        .await?;

    let mut report = service.get_status(&started.run_id).await?;
    for _ in 0..100 {
        if report.status == GenerateStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        report = service.get_status(&started.run_id).await?;
    }

    assert_eq!(report.status, GenerateStatus::Completed);
    assert_eq!(report.current_step, GenerationStep::Completed);
    assert_eq!(report.recipes.map(|recipes| recipes.len()), Some(1));

    handle.shutdown().await?;
    worker_task.await??;
    Ok(())
}
