//! Escoffier CLI binary.
//!
//! This binary provides command-line access to the pipeline:
//! - Run a worker that executes queued runs
//! - Start runs and query their status
//! - Apply database migrations

use clap::Parser;
use escoffier::{EscoffierConfig, init_logging};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, GenerateOptions, handle_generate_command, handle_migrate_command,
        handle_status_command, handle_worker_command,
    };

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EscoffierConfig::from_file(path)?,
        None => EscoffierConfig::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    // Execute the requested command
    match cli.command {
        Commands::Worker => handle_worker_command(&config).await?,

        Commands::Generate {
            user,
            prompt,
            ingredients,
            dietary_restrictions,
            amount,
            wait,
            local,
        } => {
            let options = GenerateOptions {
                user,
                prompt,
                ingredients,
                dietary_restrictions,
                amount,
                wait,
                local,
            };
            handle_generate_command(&config, options).await?;
        }

        Commands::Status { id } => handle_status_command(&config, &id).await?,

        Commands::Migrate => handle_migrate_command(&config).await?,
    }

    Ok(())
}
