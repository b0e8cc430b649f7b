//! Review critique produced by the second model pass.

use crate::{FoodType, StructuredOutput};
use serde::{Deserialize, Serialize};

/// Problem with a single ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientIssue {
    /// Ingredient the issue refers to
    pub ingredient_name: String,
    /// What is wrong ("missing unit", "unrealistic amount")
    pub issue: String,
    /// Suggested correction
    pub suggestion: String,
}

/// Structured critique of a draft.
///
/// Never persisted. It is logged and drives the fix step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Quality score, 1 to 10
    pub overall_quality: u8,
    /// Whether the draft's food type fits the dish
    pub food_type_valid: bool,
    /// Replacement food type when the current one does not fit
    #[serde(default)]
    pub food_type_suggestion: Option<FoodType>,
    /// Per-ingredient problems
    #[serde(default)]
    pub ingredient_issues: Vec<IngredientIssue>,
    /// Realism problems
    #[serde(default)]
    pub realism_issues: Vec<String>,
    /// Instruction problems
    #[serde(default)]
    pub instruction_issues: Vec<String>,
    /// Whether the fix step should run
    pub needs_fixes: bool,
    /// Short summary
    #[serde(default)]
    pub summary: String,
}

impl Default for ReviewResult {
    /// The "no issues" review used when the model returns an empty list.
    fn default() -> Self {
        Self {
            overall_quality: 10,
            food_type_valid: true,
            food_type_suggestion: None,
            ingredient_issues: Vec::new(),
            realism_issues: Vec::new(),
            instruction_issues: Vec::new(),
            needs_fixes: false,
            summary: String::new(),
        }
    }
}

impl ReviewResult {
    /// The issue-bearing subset handed to the fix prompt.
    pub fn issues(&self) -> ReviewIssues {
        ReviewIssues {
            food_type_valid: (!self.food_type_valid).then_some(false),
            food_type_suggestion: self.food_type_suggestion,
            ingredient_issues: self.ingredient_issues.clone(),
            realism_issues: self.realism_issues.clone(),
            instruction_issues: self.instruction_issues.clone(),
        }
    }
}

/// Review fields that describe something to fix. Empty fields are omitted
/// when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssues {
    /// Present only when the food type was judged invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_type_valid: Option<bool>,
    /// Suggested food type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_type_suggestion: Option<FoodType>,
    /// Ingredient problems
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ingredient_issues: Vec<IngredientIssue>,
    /// Realism problems
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub realism_issues: Vec<String>,
    /// Instruction problems
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub instruction_issues: Vec<String>,
}

impl ReviewIssues {
    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.food_type_valid.is_none()
            && self.food_type_suggestion.is_none()
            && self.ingredient_issues.is_empty()
            && self.realism_issues.is_empty()
            && self.instruction_issues.is_empty()
    }
}

/// Wire shape of the review call: one review per draft sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewList {
    /// Reviews, in draft order
    #[serde(default)]
    pub reviews: Vec<ReviewResult>,
}

impl ReviewList {
    /// First review, or the "no issues" default.
    pub fn into_first(self) -> ReviewResult {
        self.reviews.into_iter().next().unwrap_or_default()
    }
}

impl StructuredOutput for ReviewList {
    fn shape() -> serde_json::Value {
        serde_json::json!({
            "reviews": [{
                "overall_quality": "integer 1-10",
                "food_type_valid": "boolean",
                "food_type_suggestion": "BREAKFAST | LUNCH | DINNER | DESSERT | SNACK | DRINK | null",
                "ingredient_issues": [{"ingredient_name": "string", "issue": "string", "suggestion": "string"}],
                "realism_issues": ["string"],
                "instruction_issues": ["string"],
                "needs_fixes": "boolean",
                "summary": "string"
            }]
        })
    }

    fn validate(&self) -> Result<(), String> {
        for review in &self.reviews {
            if !(1..=10).contains(&review.overall_quality) {
                return Err(format!(
                    "overall_quality must be between 1 and 10, got {}",
                    review.overall_quality
                ));
            }
        }
        Ok(())
    }
}
