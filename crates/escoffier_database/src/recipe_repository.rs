//! PostgreSQL recipe repository.

use crate::DatabaseResult;
use crate::connection::{DbPool, like_prefix, with_connection};
use crate::models::{NewRecipeRow, RecipeChangeset, RecipeRow};
use crate::schema::recipes;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use escoffier_core::{
    FinalizeOutcome, FinalizedRecipe, GenerationStateUpdate, NewRecipePlaceholder, Recipe,
};
use escoffier_error::{DatabaseError, DatabaseErrorKind, EscoffierResult};
use escoffier_interface::RecipeRepository;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Recipe persistence backed by PostgreSQL.
///
/// Each operation checks out a pooled connection on the blocking thread pool
/// and runs in its own short transaction.
#[derive(Debug, Clone)]
pub struct PostgresRecipeRepository {
    pool: DbPool,
}

impl PostgresRecipeRepository {
    /// Create a repository over a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn load_for_update(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Recipe> {
    let row = recipes::table
        .find(id)
        .select(RecipeRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound))?;
    Recipe::try_from(row)
}

fn store(conn: &mut PgConnection, recipe: &Recipe) -> DatabaseResult<()> {
    diesel::update(recipes::table.find(recipe.id))
        .set(RecipeChangeset::try_from(recipe)?)
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl RecipeRepository for PostgresRecipeRepository {
    #[instrument(skip(self, placeholder), fields(run_id = %placeholder.run_id, recipe_id = %placeholder.id))]
    async fn create_placeholder(
        &self,
        placeholder: &NewRecipePlaceholder,
    ) -> EscoffierResult<Recipe> {
        let row = NewRecipeRow::try_from(placeholder)?;
        let id = placeholder.id;

        let recipe = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let inserted = diesel::insert_into(recipes::table)
                    .values(&row)
                    .on_conflict(recipes::id)
                    .do_nothing()
                    .execute(conn)?;

                if inserted == 0 {
                    debug!("Placeholder already exists");
                }

                let row = recipes::table
                    .find(id)
                    .select(RecipeRow::as_select())
                    .first(conn)?;
                Recipe::try_from(row)
            })
        })
        .await?;

        Ok(recipe)
    }

    #[instrument(skip(self))]
    async fn get_recipe(&self, id: Uuid) -> EscoffierResult<Option<Recipe>> {
        let recipe = with_connection(&self.pool, move |conn| {
            recipes::table
                .find(id)
                .select(RecipeRow::as_select())
                .first(conn)
                .optional()?
                .map(Recipe::try_from)
                .transpose()
        })
        .await?;
        Ok(recipe)
    }

    #[instrument(skip(self))]
    async fn find_by_run_prefix(&self, prefix: &str) -> EscoffierResult<Vec<Recipe>> {
        let pattern = like_prefix(prefix);
        let recipes = with_connection(&self.pool, move |conn| {
            recipes::table
                .filter(recipes::run_id.like(pattern))
                .order((recipes::created_at.asc(), recipes::run_id.asc()))
                .select(RecipeRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Recipe::try_from)
                .collect::<DatabaseResult<Vec<_>>>()
        })
        .await?;
        Ok(recipes)
    }

    #[instrument(skip(self, update), fields(step = ?update.step, status = ?update.status))]
    async fn update_generation_state(
        &self,
        id: Uuid,
        update: &GenerationStateUpdate,
    ) -> EscoffierResult<Recipe> {
        let update = update.clone();
        let recipe = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let mut recipe = load_for_update(conn, id)?;
                if recipe.state.apply(&update, Utc::now()) {
                    store(conn, &recipe)?;
                } else {
                    debug!(current = %recipe.state.step, "State update dropped");
                }
                Ok(recipe)
            })
        })
        .await?;
        Ok(recipe)
    }

    #[instrument(skip(self, finalized), fields(name = %finalized.name))]
    async fn finalize_recipe(
        &self,
        id: Uuid,
        finalized: &FinalizedRecipe,
    ) -> EscoffierResult<Recipe> {
        let finalized = finalized.clone();
        let recipe = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let mut recipe = load_for_update(conn, id)?;
                match recipe.finalize(&finalized, Utc::now()) {
                    FinalizeOutcome::Written => store(conn, &recipe)?,
                    FinalizeOutcome::Unchanged => debug!("Recipe already finalized"),
                    FinalizeOutcome::Rejected => {
                        warn!("Refusing to finalize a failed recipe");
                        return Err(DatabaseError::new(DatabaseErrorKind::Conflict(format!(
                            "recipe {id} has already failed"
                        ))));
                    }
                }
                Ok(recipe)
            })
        })
        .await?;
        Ok(recipe)
    }
}
