//! Recipe content: the draft produced by the model and the persisted entity.

use crate::{
    GenerationStateUpdate, GenerationStatus, GenerationStep, RunState, StructuredOutput,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest recipe name accepted from the model.
pub const MAX_NAME_LEN: usize = 255;

/// Category a recipe belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum FoodType {
    /// Morning meal
    Breakfast,
    /// Midday meal
    Lunch,
    /// Evening meal
    Dinner,
    /// Sweet course
    Dessert,
    /// Between meals
    Snack,
    /// Beverage
    Drink,
}

impl FoodType {
    /// Parse a tag leniently, `None` for anything unrecognized.
    pub fn parse_lenient(tag: &str) -> Option<FoodType> {
        tag.trim().parse().ok()
    }
}

/// One ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name
    pub name: String,
    /// Quantity, kept as text ("2", "1/2", "3-4")
    pub amount: String,
    /// Unit of measurement
    pub unit: String,
}

impl Ingredient {
    /// Convenience constructor.
    pub fn new(
        name: impl Into<String>,
        amount: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
            unit: unit.into(),
        }
    }
}

/// A generated recipe before it is persisted.
///
/// The food type is carried as the raw tag so that a draft with an unknown
/// category can still flow through review and fix; [`FinalizedRecipe`]
/// resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    /// Recipe name
    pub name: String,
    /// Short description
    pub description: String,
    /// Ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Ordered instruction steps
    pub instructions: Vec<String>,
    /// Category tag
    pub food_type: String,
}

impl DraftContent {
    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(format!("name must be at most {MAX_NAME_LEN} characters"));
        }
        if self.ingredients.is_empty() {
            return Err("ingredients must not be empty".to_string());
        }
        if self.instructions.is_empty() {
            return Err("instructions must not be empty".to_string());
        }
        if FoodType::parse_lenient(&self.food_type).is_none() {
            return Err(format!(
                "food_type '{}' must be one of BREAKFAST, LUNCH, DINNER, DESSERT, SNACK, DRINK",
                self.food_type
            ));
        }
        Ok(())
    }
}

impl StructuredOutput for DraftContent {
    fn shape() -> serde_json::Value {
        serde_json::json!({
            "name": "string, at most 255 characters",
            "description": "string, 2-3 sentences",
            "ingredients": [{"name": "string", "amount": "string", "unit": "string"}],
            "instructions": ["string"],
            "food_type": "BREAKFAST | LUNCH | DINNER | DESSERT | SNACK | DRINK"
        })
    }

    fn validate(&self) -> Result<(), String> {
        self.check()
    }
}

/// Corrected draft returned by the fix step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedContent {
    /// Recipe name
    pub name: String,
    /// Short description
    pub description: String,
    /// Ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Ordered instruction steps
    pub instructions: Vec<String>,
    /// Category tag
    pub food_type: String,
    /// What the model changed
    #[serde(default)]
    pub changes_made: Vec<String>,
}

impl FixedContent {
    /// Drop the change list, keeping the corrected draft.
    pub fn into_draft(self) -> DraftContent {
        DraftContent {
            name: self.name,
            description: self.description,
            ingredients: self.ingredients,
            instructions: self.instructions,
            food_type: self.food_type,
        }
    }
}

impl StructuredOutput for FixedContent {
    fn shape() -> serde_json::Value {
        let mut shape = DraftContent::shape();
        if let Some(map) = shape.as_object_mut() {
            map.insert("changes_made".to_string(), serde_json::json!(["string"]));
        }
        shape
    }

    fn validate(&self) -> Result<(), String> {
        self.clone().into_draft().check()
    }
}

/// Fields Finalize writes onto the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedRecipe {
    /// Recipe name
    pub name: String,
    /// Short description
    pub description: String,
    /// Ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Instructions joined into one block
    pub instructions: String,
    /// Resolved category; unknown tags become `None`
    pub food_type: Option<FoodType>,
}

impl From<&DraftContent> for FinalizedRecipe {
    fn from(draft: &DraftContent) -> Self {
        Self {
            name: draft.name.clone(),
            description: draft.description.clone(),
            ingredients: draft.ingredients.clone(),
            instructions: draft.instructions.join("\n"),
            food_type: FoodType::parse_lenient(&draft.food_type),
        }
    }
}

/// Values for a new placeholder entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipePlaceholder {
    /// Entity id, derived from the run id
    pub id: Uuid,
    /// Owning run
    pub run_id: String,
    /// Requesting user
    pub created_by: String,
    /// Original prompt
    pub prompt: String,
    /// Full serialized request, used to resume after a restart
    pub request: serde_json::Value,
}

/// Namespace for deterministic recipe ids.
const RECIPE_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_23b4_4a7e_4d0b_9a1e_5f3c_2b8d_7e91);

/// Entity id for the recipe produced by `run_id`.
///
/// The same run id always maps to the same entity, which is what makes
/// placeholder creation idempotent.
pub fn recipe_id_for_run(run_id: &str) -> Uuid {
    Uuid::new_v5(&RECIPE_NAMESPACE, run_id.as_bytes())
}

/// Persisted recipe entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Entity id
    pub id: Uuid,
    /// Owning run
    pub run_id: String,
    /// Requesting user
    pub created_by: String,
    /// Original prompt
    pub prompt: String,
    /// Full serialized request
    pub request: serde_json::Value,
    /// Recipe name, set by Finalize
    pub name: Option<String>,
    /// Description, set by Finalize
    pub description: Option<String>,
    /// Ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Instruction block, set by Finalize
    pub instructions: Option<String>,
    /// Resolved category
    pub food_type: Option<FoodType>,
    /// Always true for pipeline-produced entities
    pub is_generated: bool,
    /// Run state
    pub state: RunState,
}

impl Recipe {
    /// Build the entity a placeholder insert produces.
    pub fn from_placeholder(placeholder: NewRecipePlaceholder, now: DateTime<Utc>) -> Self {
        Self {
            id: placeholder.id,
            run_id: placeholder.run_id,
            created_by: placeholder.created_by,
            prompt: placeholder.prompt,
            request: placeholder.request,
            name: None,
            description: None,
            ingredients: Vec::new(),
            instructions: None,
            food_type: None,
            is_generated: true,
            state: RunState::queued(now),
        }
    }

    /// Whether the persisted content already equals `finalized`.
    pub fn has_content(&self, finalized: &FinalizedRecipe) -> bool {
        self.name.as_deref() == Some(finalized.name.as_str())
            && self.description.as_deref() == Some(finalized.description.as_str())
            && self.ingredients == finalized.ingredients
            && self.instructions.as_deref() == Some(finalized.instructions.as_str())
            && self.food_type == finalized.food_type
    }

    /// Overwrite content fields with `finalized`.
    pub fn set_content(&mut self, finalized: &FinalizedRecipe) {
        self.name = Some(finalized.name.clone());
        self.description = Some(finalized.description.clone());
        self.ingredients = finalized.ingredients.clone();
        self.instructions = Some(finalized.instructions.clone());
        self.food_type = finalized.food_type;
    }

    /// Write final content and move the run to completed.
    ///
    /// A completed entity that already holds the same content is left
    /// untouched, timestamps included. A failed entity is never finalized.
    pub fn finalize(
        &mut self,
        finalized: &FinalizedRecipe,
        now: DateTime<Utc>,
    ) -> FinalizeOutcome {
        if self.state.step == GenerationStep::Failed
            || self.state.status == GenerationStatus::Failed
        {
            return FinalizeOutcome::Rejected;
        }
        if self.state.step == GenerationStep::Completed && self.has_content(finalized) {
            return FinalizeOutcome::Unchanged;
        }

        self.set_content(finalized);
        if !self.state.apply(
            &GenerationStateUpdate::step_and_status(
                GenerationStep::Completed,
                GenerationStatus::Completed,
            ),
            now,
        ) {
            self.state.updated_at = now;
        }
        FinalizeOutcome::Written
    }
}

/// Result of [`Recipe::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Content and state were written
    Written,
    /// Already completed with identical content
    Unchanged,
    /// The run had already failed
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(food_type: &str) -> DraftContent {
        DraftContent {
            name: "Scrambled Eggs".into(),
            description: "Soft eggs.".into(),
            ingredients: vec![Ingredient::new("eggs", "3", "pieces")],
            instructions: vec!["Whisk.".into(), "Cook gently.".into()],
            food_type: food_type.into(),
        }
    }

    #[test]
    fn test_food_type_parses_any_case() {
        assert_eq!(FoodType::parse_lenient("breakfast"), Some(FoodType::Breakfast));
        assert_eq!(FoodType::parse_lenient(" DRINK "), Some(FoodType::Drink));
        assert_eq!(FoodType::parse_lenient("brunch"), None);
    }

    #[test]
    fn test_finalize_joins_instructions_and_coerces_unknown_type() {
        let finalized = FinalizedRecipe::from(&draft("brunch"));
        assert_eq!(finalized.instructions, "Whisk.\nCook gently.");
        assert_eq!(finalized.food_type, None);

        let finalized = FinalizedRecipe::from(&draft("Breakfast"));
        assert_eq!(finalized.food_type, Some(FoodType::Breakfast));
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft("BREAKFAST").validate().is_ok());
        assert!(draft("BRUNCH").validate().is_err());

        let mut empty = draft("LUNCH");
        empty.ingredients.clear();
        assert!(empty.validate().is_err());

        let mut long = draft("LUNCH");
        long.name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_recipe_id_is_stable_per_run() {
        assert_eq!(recipe_id_for_run("run-a"), recipe_id_for_run("run-a"));
        assert_ne!(recipe_id_for_run("run-a"), recipe_id_for_run("run-b"));
    }

    #[test]
    fn test_has_content_after_set_content() {
        let placeholder = NewRecipePlaceholder {
            id: recipe_id_for_run("run-a"),
            run_id: "run-a".into(),
            created_by: "user".into(),
            prompt: "eggs".into(),
            request: serde_json::Value::Null,
        };
        let mut recipe = Recipe::from_placeholder(placeholder, Utc::now());
        let finalized = FinalizedRecipe::from(&draft("BREAKFAST"));
        assert!(!recipe.has_content(&finalized));
        recipe.set_content(&finalized);
        assert!(recipe.has_content(&finalized));
    }

    #[test]
    fn test_finalize_twice_is_idempotent() {
        let placeholder = NewRecipePlaceholder {
            id: recipe_id_for_run("run-b"),
            run_id: "run-b".into(),
            created_by: "user".into(),
            prompt: "eggs".into(),
            request: serde_json::Value::Null,
        };
        let start = Utc::now();
        let mut recipe = Recipe::from_placeholder(placeholder, start);
        let finalized = FinalizedRecipe::from(&draft("BREAKFAST"));

        let first_at = start + chrono::TimeDelta::seconds(1);
        assert_eq!(recipe.finalize(&finalized, first_at), FinalizeOutcome::Written);
        let snapshot = recipe.clone();

        let second_at = start + chrono::TimeDelta::seconds(2);
        assert_eq!(recipe.finalize(&finalized, second_at), FinalizeOutcome::Unchanged);
        assert_eq!(recipe, snapshot);
        assert_eq!(recipe.state.step, GenerationStep::Completed);
        assert_eq!(recipe.state.status, GenerationStatus::Completed);
    }

    #[test]
    fn test_failed_recipe_is_not_finalized() {
        let placeholder = NewRecipePlaceholder {
            id: recipe_id_for_run("run-c"),
            run_id: "run-c".into(),
            created_by: "user".into(),
            prompt: "eggs".into(),
            request: serde_json::Value::Null,
        };
        let now = Utc::now();
        let mut recipe = Recipe::from_placeholder(placeholder, now);
        recipe.state.apply(
            &GenerationStateUpdate::failed(GenerationStep::Generating, "boom"),
            now,
        );

        let finalized = FinalizedRecipe::from(&draft("BREAKFAST"));
        assert_eq!(recipe.finalize(&finalized, now), FinalizeOutcome::Rejected);
        assert!(recipe.name.is_none());
    }
}
