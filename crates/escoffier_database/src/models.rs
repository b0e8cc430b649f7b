//! Diesel row types and conversions to the core model.

use crate::schema::{generation_logs, generation_runs, recipes};
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use diesel::prelude::*;
use escoffier_core::{
    CallLogEntry, FoodType, GenerationRequest, GenerationStatus, GenerationStep, Ingredient,
    LogStep, NewRecipePlaceholder, QueueState, QueuedRun, Recipe, RunState,
};
use escoffier_error::{DatabaseError, DatabaseErrorKind};
use std::str::FromStr;
use uuid::Uuid;

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, DatabaseError> {
    value.parse().map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "unrecognized {column} value '{value}'"
        )))
    })
}

/// Database row for the recipes table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = recipes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecipeRow {
    pub id: Uuid,
    pub run_id: String,
    pub created_by: String,
    pub prompt: String,
    pub request: serde_json::Value,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: serde_json::Value,
    pub instructions: Option<String>,
    pub food_type: Option<String>,
    pub is_generated: bool,
    pub generation_step: String,
    pub generation_status: String,
    pub generation_error: Option<String>,
    pub failed_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = DatabaseError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let ingredients: Vec<Ingredient> = serde_json::from_value(row.ingredients)?;
        let failed_step = row
            .failed_step
            .as_deref()
            .map(|step| parse_column::<GenerationStep>("failed_step", step))
            .transpose()?;

        Ok(Recipe {
            id: row.id,
            run_id: row.run_id,
            created_by: row.created_by,
            prompt: row.prompt,
            request: row.request,
            name: row.name,
            description: row.description,
            ingredients,
            instructions: row.instructions,
            // Stored values are written through FoodType, anything else is legacy data
            food_type: row.food_type.as_deref().and_then(FoodType::parse_lenient),
            is_generated: row.is_generated,
            state: RunState {
                step: parse_column("generation_step", &row.generation_step)?,
                status: parse_column::<GenerationStatus>(
                    "generation_status",
                    &row.generation_status,
                )?,
                error: row.generation_error,
                failed_step,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        })
    }
}

/// Insertable placeholder row.
#[derive(Debug, Clone, Insertable, Builder)]
#[diesel(table_name = recipes)]
#[builder(setter(into))]
pub struct NewRecipeRow {
    pub id: Uuid,
    pub run_id: String,
    pub created_by: String,
    pub prompt: String,
    pub request: serde_json::Value,
    #[builder(default = "true")]
    pub is_generated: bool,
    #[builder(default = "GenerationStep::Queued.to_string()")]
    pub generation_step: String,
    #[builder(default = "GenerationStatus::Pending.to_string()")]
    pub generation_status: String,
}

impl TryFrom<&NewRecipePlaceholder> for NewRecipeRow {
    type Error = DatabaseError;

    fn try_from(placeholder: &NewRecipePlaceholder) -> Result<Self, Self::Error> {
        NewRecipeRowBuilder::default()
            .id(placeholder.id)
            .run_id(placeholder.run_id.as_str())
            .created_by(placeholder.created_by.as_str())
            .prompt(placeholder.prompt.as_str())
            .request(placeholder.request.clone())
            .build()
            .map_err(|e| DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string())))
    }
}

/// Every mutable column of a recipe, written after an in-memory transition.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = recipes)]
#[diesel(treat_none_as_null = true)]
pub struct RecipeChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: serde_json::Value,
    pub instructions: Option<String>,
    pub food_type: Option<String>,
    pub generation_step: String,
    pub generation_status: String,
    pub generation_error: Option<String>,
    pub failed_step: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Recipe> for RecipeChangeset {
    type Error = DatabaseError;

    fn try_from(recipe: &Recipe) -> Result<Self, Self::Error> {
        Ok(Self {
            name: recipe.name.clone(),
            description: recipe.description.clone(),
            ingredients: serde_json::to_value(&recipe.ingredients)?,
            instructions: recipe.instructions.clone(),
            food_type: recipe.food_type.map(|food_type| food_type.to_string()),
            generation_step: recipe.state.step.to_string(),
            generation_status: recipe.state.status.to_string(),
            generation_error: recipe.state.error.clone(),
            failed_step: recipe.state.failed_step.map(|step| step.to_string()),
            updated_at: recipe.state.updated_at,
        })
    }
}

/// Database row for the generation_logs table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = generation_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CallLogRow {
    pub id: Uuid,
    pub run_id: String,
    pub recipe_id: Uuid,
    pub step: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub raw_response: String,
    pub parsed_response: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl From<&CallLogEntry> for CallLogRow {
    fn from(entry: &CallLogEntry) -> Self {
        Self {
            id: entry.id,
            run_id: entry.run_id.clone(),
            recipe_id: entry.recipe_id,
            step: entry.step.to_string(),
            system_prompt: entry.system_prompt.clone(),
            user_prompt: entry.user_prompt.clone(),
            raw_response: entry.raw_response.clone(),
            parsed_response: entry.parsed_response.clone(),
            success: entry.success,
            error: entry.error.clone(),
            duration_ms: entry.duration_ms,
            model: entry.model.clone(),
            created_at: entry.created_at,
        }
    }
}

impl TryFrom<CallLogRow> for CallLogEntry {
    type Error = DatabaseError;

    fn try_from(row: CallLogRow) -> Result<Self, Self::Error> {
        Ok(CallLogEntry {
            id: row.id,
            run_id: row.run_id,
            recipe_id: row.recipe_id,
            step: parse_column::<LogStep>("step", &row.step)?,
            system_prompt: row.system_prompt,
            user_prompt: row.user_prompt,
            raw_response: row.raw_response,
            parsed_response: row.parsed_response,
            success: row.success,
            error: row.error,
            duration_ms: row.duration_ms,
            model: row.model,
            created_at: row.created_at,
        })
    }
}

/// Database row for the generation_runs table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = generation_runs)]
#[diesel(primary_key(run_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RunRow {
    pub run_id: String,
    pub request: serde_json::Value,
    pub state: String,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub dispatch_count: i32,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RunRow> for QueuedRun {
    type Error = DatabaseError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let request: GenerationRequest = serde_json::from_value(row.request)?;
        Ok(QueuedRun {
            run_id: row.run_id,
            request,
            state: parse_column::<QueueState>("state", &row.state)?,
            claimed_by: row.claimed_by,
            lease_expires_at: row.lease_expires_at,
            dispatch_count: u32::try_from(row.dispatch_count).unwrap_or_default(),
            error: row.error,
            enqueued_at: row.enqueued_at,
        })
    }
}

/// Insertable queue row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = generation_runs)]
pub struct NewRunRow {
    pub run_id: String,
    pub request: serde_json::Value,
}

impl TryFrom<&GenerationRequest> for NewRunRow {
    type Error = DatabaseError;

    fn try_from(request: &GenerationRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            run_id: request.run_id.clone(),
            request: serde_json::to_value(request)?,
        })
    }
}
