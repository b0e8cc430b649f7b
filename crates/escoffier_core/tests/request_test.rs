use escoffier_core::{CallLogEntry, GenerationRequest, LogStep, recipe_id_for_run};

#[test]
fn request_builder_defaults_optional_lists() {
    let request = GenerationRequest::builder()
        .run_id("recipe-gen-0123456789ab")
        .user_id("user_1")
        .prompt("healthy chicken dinner")
        .build()
        .unwrap();

    assert!(request.ingredients.is_none());
    assert!(request.dietary_restrictions.is_none());
}

#[test]
fn request_builder_requires_prompt() {
    let result = GenerationRequest::builder()
        .run_id("recipe-gen-0123456789ab")
        .user_id("user_1")
        .build();

    assert!(result.is_err());
}

#[test]
fn request_deserializes_without_optional_lists() {
    let request: GenerationRequest = serde_json::from_value(serde_json::json!({
        "run_id": "recipe-gen-0123456789ab",
        "user_id": "user_1",
        "prompt": "quick breakfast with eggs"
    }))
    .unwrap();

    assert_eq!(request.prompt, "quick breakfast with eggs");
    assert!(request.ingredients.is_none());
}

#[test]
fn call_log_builder_fills_identity_and_timestamp() {
    let entry = CallLogEntry::builder()
        .run_id("recipe-gen-0123456789ab")
        .recipe_id(recipe_id_for_run("recipe-gen-0123456789ab"))
        .step(LogStep::Review)
        .system_prompt("system")
        .user_prompt("user")
        .success(false)
        .error(Some("timed out".to_string()))
        .duration_ms(1200)
        .model("test-model")
        .build()
        .unwrap();

    assert!(entry.raw_response.is_empty());
    assert!(entry.parsed_response.is_none());
    assert_eq!(entry.step.to_string(), "REVIEW");
}
