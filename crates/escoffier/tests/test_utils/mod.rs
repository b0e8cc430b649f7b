//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use escoffier::EscoffierConfig;
use escoffier_core::{CompletionRequest, CompletionResponse, Role};
use escoffier_error::EscoffierResult;
use escoffier_interface::EscoffierDriver;
use escoffier_workflow::{GENERATE_SYSTEM, REVIEW_SYSTEM};

/// Answers every step with a fixed, valid reply.
#[derive(Debug)]
pub struct CannedDriver;

pub const DRAFT: &str = r#"{
    "name": "Lemon Lentil Soup",
    "description": "A bright, filling soup.",
    "ingredients": [
        {"name": "red lentils", "amount": "1", "unit": "cup"},
        {"name": "lemon", "amount": "1", "unit": "piece"}
    ],
    "instructions": ["Simmer the lentils for 20 minutes.", "Finish with lemon juice."],
    "food_type": "LUNCH"
}"#;

pub const REVIEW: &str = r#"{"reviews": [{
    "overall_quality": 9,
    "food_type_valid": true,
    "food_type_suggestion": null,
    "ingredient_issues": [],
    "realism_issues": [],
    "instruction_issues": [],
    "needs_fixes": false,
    "summary": "Ready to cook"
}]}"#;

#[async_trait]
impl EscoffierDriver for CannedDriver {
    async fn generate(&self, req: &CompletionRequest) -> EscoffierResult<CompletionResponse> {
        let system = req
            .messages
            .iter()
            .find(|message| message.role == Role::System)
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let content = if system.starts_with(GENERATE_SYSTEM) {
            DRAFT
        } else if system.starts_with(REVIEW_SYSTEM) {
            REVIEW
        } else {
            DRAFT
        };
        Ok(CompletionResponse {
            content: content.to_string(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "canned"
    }

    fn model_name(&self) -> &str {
        "canned-model"
    }
}

pub fn test_config() -> EscoffierConfig {
    EscoffierConfig::from_toml_str(
        r#"
        [worker]
        worker_id = "pipeline-test"
        poll_interval_ms = 50
        max_concurrent_workflow_tasks = 2
        max_concurrent_activities = 2
        "#,
    )
    .expect("test config")
}
