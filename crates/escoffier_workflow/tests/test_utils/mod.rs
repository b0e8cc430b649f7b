//! Shared fixtures for workflow tests.

#![allow(dead_code)]

mod flaky_repository;
mod scripted_driver;

pub use flaky_repository::FlakyRecipeRepository;
pub use scripted_driver::{Route, Scripted, ScriptedDriver};

use escoffier_core::{DraftContent, GenerationRequest, LogStep};
use escoffier_models::GenerationClient;
use escoffier_workflow::{
    InMemoryCallLog, InMemoryRunQueue, RecipeGenerationWorkflow, StatusProjection, StepExecutors,
    StepRunner, WorkflowContext, WorkflowOutcome,
};
use std::sync::Arc;

/// Collaborators wired the way the worker wires them.
pub struct Harness {
    pub driver: Arc<ScriptedDriver>,
    pub recipes: Arc<FlakyRecipeRepository>,
    pub call_log: Arc<InMemoryCallLog>,
    pub queue: Arc<InMemoryRunQueue>,
    pub context: Arc<WorkflowContext>,
}

impl Harness {
    pub fn new(driver: ScriptedDriver) -> Self {
        Self::with_activity_slots(driver, 8)
    }

    /// Harness whose runs share `slots` concurrent step attempts.
    pub fn with_activity_slots(driver: ScriptedDriver, slots: usize) -> Self {
        let driver = Arc::new(driver);
        let recipes = Arc::new(FlakyRecipeRepository::new());
        let call_log = Arc::new(InMemoryCallLog::new());
        let queue = Arc::new(InMemoryRunQueue::new());

        let client = GenerationClient::new(driver.clone());
        let executors = StepExecutors::new(recipes.clone(), call_log.clone(), client);
        let context = Arc::new(WorkflowContext::new(executors, StepRunner::new(slots)));

        Self {
            driver,
            recipes,
            call_log,
            queue,
            context,
        }
    }

    pub fn workflow(&self, request: GenerationRequest) -> RecipeGenerationWorkflow {
        RecipeGenerationWorkflow::new(Arc::clone(&self.context), request)
    }

    pub async fn run(&self, request: GenerationRequest) -> WorkflowOutcome {
        self.workflow(request).run().await
    }

    pub fn projection(&self) -> StatusProjection {
        StatusProjection::new(self.recipes.clone(), self.queue.clone())
    }

    /// Log entries for `step`, in insertion order.
    pub fn log_entries(&self, step: LogStep) -> Vec<escoffier_core::CallLogEntry> {
        self.call_log
            .entries()
            .into_iter()
            .filter(|entry| entry.step == step)
            .collect()
    }

    /// Let tasks spawned from drop guards run.
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}

pub fn breakfast_request(run_id: &str) -> GenerationRequest {
    GenerationRequest::builder()
        .run_id(run_id)
        .user_id("user_1")
        .prompt("quick breakfast with eggs")
        .ingredients(Some(vec!["eggs".to_string()]))
        .build()
        .expect("valid request")
}

pub fn draft() -> DraftContent {
    serde_json::from_str(&draft_json()).expect("draft fixture")
}

pub fn draft_json() -> String {
    serde_json::json!({
        "name": "Chive Scrambled Eggs",
        "description": "Soft, creamy eggs ready in five minutes.",
        "ingredients": [
            {"name": "eggs", "amount": "3", "unit": "pieces"},
            {"name": "butter", "amount": "1", "unit": "tablespoon"},
            {"name": "chives", "amount": "1", "unit": "teaspoon"}
        ],
        "instructions": [
            "Whisk the eggs with a pinch of salt.",
            "Melt the butter over low heat.",
            "Stir the eggs gently until just set, about 3 minutes.",
            "Top with chives."
        ],
        "food_type": "BREAKFAST"
    })
    .to_string()
}

pub fn fixed_json() -> String {
    serde_json::json!({
        "name": "Chive Scrambled Eggs",
        "description": "Soft, creamy eggs ready in five minutes.",
        "ingredients": [
            {"name": "eggs", "amount": "3", "unit": "pieces"},
            {"name": "butter", "amount": "1", "unit": "tablespoon"},
            {"name": "chives", "amount": "1", "unit": "tablespoon"},
            {"name": "salt", "amount": "1/4", "unit": "teaspoon"}
        ],
        "instructions": [
            "Whisk the eggs with the salt.",
            "Melt the butter over low heat.",
            "Stir the eggs gently until just set, about 3 minutes.",
            "Top with chives."
        ],
        "food_type": "BREAKFAST",
        "changes_made": ["Added salt as an ingredient with an amount"]
    })
    .to_string()
}

pub fn review_json(needs_fixes: bool) -> String {
    let realism: Vec<&str> = if needs_fixes {
        vec!["Salt is used but not listed"]
    } else {
        vec![]
    };
    let quality = if needs_fixes { 6 } else { 9 };
    serde_json::json!({
        "reviews": [{
            "overall_quality": quality,
            "food_type_valid": true,
            "food_type_suggestion": null,
            "ingredient_issues": [],
            "realism_issues": realism,
            "instruction_issues": [],
            "needs_fixes": needs_fixes,
            "summary": "Solid breakfast"
        }]
    })
    .to_string()
}

/// A driver that drafts, reviews with `needs_fixes`, and fixes successfully.
pub fn happy_driver(needs_fixes: bool) -> ScriptedDriver {
    ScriptedDriver::new()
        .always(Route::Generate, Scripted::Reply(draft_json()))
        .always(Route::Review, Scripted::Reply(review_json(needs_fixes)))
        .always(Route::Fix, Scripted::Reply(fixed_json()))
}
