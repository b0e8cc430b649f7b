// Tests for GenerationClient's reformulation loop using MockDriver.

mod test_utils;

use escoffier_core::{DraftContent, ReviewList, Role};
use escoffier_error::{EscoffierErrorKind, ModelsErrorKind, RetryableError};
use escoffier_models::{CallParams, GenerationClient, structured_system_prompt};
use std::sync::Arc;
use test_utils::{MockDriver, MockResponse};

const PARAMS: CallParams = CallParams::new(1024, 0.7);

fn draft_json() -> String {
    serde_json::json!({
        "name": "Scrambled Eggs",
        "description": "Soft and creamy.",
        "ingredients": [{"name": "eggs", "amount": "3", "unit": "pieces"}],
        "instructions": ["Whisk the eggs.", "Cook on low heat for 3 minutes."],
        "food_type": "BREAKFAST"
    })
    .to_string()
}

#[tokio::test]
async fn valid_output_is_accepted_first_time() -> anyhow::Result<()> {
    let driver = Arc::new(MockDriver::new_sequence(vec![MockResponse::Success(
        draft_json(),
    )]));
    let client = GenerationClient::new(driver.clone());

    let completion = client
        .complete::<DraftContent>("system", "user", PARAMS)
        .await?;

    assert_eq!(completion.value.name, "Scrambled Eggs");
    assert_eq!(completion.attempts, 1);
    assert_eq!(driver.call_count(), 1);

    let request = &driver.requests()[0];
    assert_eq!(request.max_tokens, Some(1024));
    assert_eq!(request.temperature, Some(0.7));
    Ok(())
}

#[tokio::test]
async fn invalid_output_is_reformulated() -> anyhow::Result<()> {
    let driver = Arc::new(MockDriver::new_sequence(vec![
        MockResponse::Success("not json at all".to_string()),
        MockResponse::Success(format!("```json\n{}\n```", draft_json())),
    ]));
    let client = GenerationClient::new(driver.clone());

    let completion = client
        .complete::<DraftContent>("system", "user", PARAMS)
        .await?;

    assert_eq!(completion.attempts, 2);

    // The retry carries the bad reply and a correction.
    let second = &driver.requests()[1];
    assert_eq!(second.messages.len(), 4);
    assert_eq!(second.messages[2].role, Role::Assistant);
    assert_eq!(second.messages[2].content, "not json at all");
    assert_eq!(second.messages[3].role, Role::User);
    Ok(())
}

#[tokio::test]
async fn semantic_validation_failure_is_reformulated() -> anyhow::Result<()> {
    let mut bad: serde_json::Value = serde_json::from_str(&draft_json())?;
    bad["food_type"] = serde_json::json!("BRUNCH");

    let driver = Arc::new(MockDriver::new_sequence(vec![
        MockResponse::Success(bad.to_string()),
        MockResponse::Success(draft_json()),
    ]));
    let client = GenerationClient::new(driver.clone());

    let completion = client
        .complete::<DraftContent>("system", "user", PARAMS)
        .await?;
    assert_eq!(completion.attempts, 2);
    Ok(())
}

#[tokio::test]
async fn reformulation_budget_is_bounded() {
    let driver = Arc::new(MockDriver::new_sequence(vec![
        MockResponse::Success("{}".to_string()),
        MockResponse::Success("{}".to_string()),
        MockResponse::Success("{}".to_string()),
        MockResponse::Success(draft_json()),
    ]));
    let client = GenerationClient::new(driver.clone());

    let err = client
        .complete::<DraftContent>("system", "user", PARAMS)
        .await
        .unwrap_err();

    assert_eq!(driver.call_count(), 3);
    match err.kind() {
        EscoffierErrorKind::Models(e) => {
            assert!(matches!(
                e.kind,
                ModelsErrorKind::SchemaValidation { attempts: 3, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn driver_errors_are_not_retried_internally() {
    let driver = Arc::new(MockDriver::new_sequence(vec![
        MockResponse::Error(ModelsErrorKind::HttpStatus {
            status_code: 503,
            message: "overloaded".to_string(),
        }),
        MockResponse::Success(draft_json()),
    ]));
    let client = GenerationClient::new(driver.clone());

    let err = client
        .complete::<DraftContent>("system", "user", PARAMS)
        .await
        .unwrap_err();

    assert_eq!(driver.call_count(), 1);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn zero_reformulations_means_single_call() {
    let driver = Arc::new(MockDriver::new_sequence(vec![
        MockResponse::Success("{}".to_string()),
        MockResponse::Success(draft_json()),
    ]));
    let client = GenerationClient::new(driver.clone()).with_reformulation_retries(0);

    assert!(
        client
            .complete::<DraftContent>("system", "user", PARAMS)
            .await
            .is_err()
    );
    assert_eq!(driver.call_count(), 1);
}

#[tokio::test]
async fn empty_review_list_parses() -> anyhow::Result<()> {
    let driver = Arc::new(MockDriver::new_sequence(vec![MockResponse::Success(
        r#"{"reviews": []}"#.to_string(),
    )]));
    let client = GenerationClient::new(driver);

    let completion = client
        .complete::<ReviewList>("system", "user", CallParams::new(1024, 0.3))
        .await?;
    assert!(!completion.value.into_first().needs_fixes);
    Ok(())
}

#[test]
fn system_prompt_embeds_shape() {
    let prompt = structured_system_prompt::<DraftContent>("You are a chef.");
    assert!(prompt.starts_with("You are a chef."));
    assert!(prompt.contains("food_type"));
}
