//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the escoffier binary.

mod commands;
mod generate;
mod migrate;
mod status;
mod worker;

pub use commands::{Cli, Commands};
pub use generate::{GenerateOptions, handle_generate_command};
pub use migrate::handle_migrate_command;
pub use status::handle_status_command;
pub use worker::handle_worker_command;
