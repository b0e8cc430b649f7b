//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Escoffier - durable LLM recipe generation
#[derive(Parser, Debug)]
#[command(name = "escoffier")]
#[command(about = "Durable LLM recipe generation: worker, run submission and status", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(short, long, global = true, env = "ESCOFFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker: claim queued runs and execute them until Ctrl+C
    Worker,

    /// Start one or more recipe generation runs
    Generate {
        /// Requesting user id
        #[arg(long)]
        user: String,

        /// Description of the dish
        #[arg(long)]
        prompt: String,

        /// Ingredient the recipe must use (repeatable)
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,

        /// Dietary restriction to follow (repeatable)
        #[arg(long = "diet")]
        dietary_restrictions: Vec<String>,

        /// Number of independent recipes, 1 to 5
        #[arg(long, default_value_t = 1)]
        amount: u8,

        /// Poll until every run finishes and print the final status
        #[arg(long)]
        wait: bool,

        /// Run in this process with in-memory stores instead of PostgreSQL
        #[arg(long)]
        local: bool,
    },

    /// Print the status of a run or batch as JSON
    Status {
        /// Run id or batch id
        id: String,
    },

    /// Apply pending database migrations
    Migrate,
}
