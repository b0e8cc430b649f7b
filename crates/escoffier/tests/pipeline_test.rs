//! The wired pipeline, end to end, over in-memory stores.

mod test_utils;

use escoffier::{EscoffierConfig, Stores, runtime};
use escoffier_core::GenerateStatus;
use escoffier_workflow::StartRunRequest;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{CannedDriver, test_config};

#[tokio::test(start_paused = true)]
async fn test_in_memory_pipeline_completes_batch() -> anyhow::Result<()> {
    let config = test_config();
    let stores = Stores::in_memory();
    let (worker, handle) = runtime::worker(&config, &stores, Arc::new(CannedDriver));
    assert_eq!(worker.worker_id(), "pipeline-test");
    let worker_task = tokio::spawn(worker.run());

    let service = runtime::service(&stores).with_worker(handle.clone());
    let started = service
        .start_run(
            StartRunRequest::builder()
                .user_id("user_1")
                .prompt("light vegan lunch")
                .dietary_restrictions(Some(vec!["vegan".to_string()]))
                .amount(4u8)
                .build()?,
        )
        .await?;
    assert_eq!(started.run_ids.len(), 4);

    let mut report = service.get_status(&started.run_id).await?;
    for _ in 0..200 {
        if report.status == GenerateStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        report = service.get_status(&started.run_id).await?;
    }
    assert_eq!(report.status, GenerateStatus::Completed);

    let recipes = report.recipes.expect("completed batch lists recipes");
    assert_eq!(recipes.len(), 4);
    assert!(
        recipes
            .iter()
            .all(|recipe| recipe.name.as_deref() == Some("Lemon Lentil Soup"))
    );

    let run_log = stores.call_log.entries_for_run(&started.run_ids[0]).await?;
    assert_eq!(run_log.len(), 2, "generate and review, no fix");
    assert!(run_log.iter().all(|entry| entry.model == "canned-model"));

    handle.shutdown().await?;
    worker_task.await??;
    Ok(())
}

#[tokio::test]
async fn test_unknown_id_reports_pending() -> anyhow::Result<()> {
    let stores = Stores::in_memory();
    let report = runtime::service(&stores)
        .get_status("recipe-gen-000000000000")
        .await?;
    assert_eq!(report.status, GenerateStatus::Pending);
    assert!(report.recipes.is_none());
    Ok(())
}

#[tokio::test]
async fn test_empty_status_id_is_rejected() {
    let stores = Stores::in_memory();
    assert!(runtime::service(&stores).get_status("").await.is_err());
}

#[test]
fn test_context_uses_configured_policies() {
    let config = EscoffierConfig::from_toml_str(
        r#"
        [retry.generative]
        initial_interval_ms = 10
        backoff_coefficient = 1.0
        max_attempts = 7
        max_interval_ms = 10

        [timeouts]
        generate_ms = 5000
        "#,
    )
    .expect("config");
    let stores = Stores::in_memory();

    let context = runtime::workflow_context(&config, &stores, Arc::new(CannedDriver));

    assert_eq!(context.policies().generative.max_attempts, 7);
    assert_eq!(context.policies().persistence.max_attempts, 3);
    assert_eq!(context.timeouts().generate, Duration::from_secs(5));
    assert_eq!(context.timeouts().review, Duration::from_secs(120));
}
