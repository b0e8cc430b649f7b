//! PostgreSQL persistence for the Escoffier recipe generation pipeline.
//!
//! This crate provides the diesel schema, embedded migrations, and
//! implementations of the collaborator traits from `escoffier_interface`:
//!
//! - [`PostgresRecipeRepository`] for recipe entities and their run state
//! - [`PostgresCallLog`] for the append-only model call log
//! - [`PostgresRunQueue`] for the durable, leased run queue
//!
//! All operations run on tokio's blocking pool with an r2d2 connection held
//! only for the duration of one short transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use escoffier_database::{establish_pool, run_migrations, PostgresRecipeRepository};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = establish_pool("postgres://localhost/escoffier", 10)?;
//! run_migrations(&mut pool.get()?)?;
//! let repo = PostgresRecipeRepository::new(pool);
//! # Ok(())
//! # }
//! ```

mod call_log;
mod connection;
mod migrations;
mod models;
mod recipe_repository;
mod run_queue;

// Public modules for external access
pub mod schema;

pub use call_log::PostgresCallLog;
pub use connection::{DbPool, establish_pool, establish_pool_from_env};
pub use migrations::run_migrations;
pub use models::{
    CallLogRow, NewRecipeRow, NewRecipeRowBuilder, NewRunRow, RecipeChangeset, RecipeRow, RunRow,
};
pub use recipe_repository::PostgresRecipeRepository;
pub use run_queue::PostgresRunQueue;

use escoffier_error::DatabaseError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
