//! Escoffier - durable LLM recipe generation
//!
//! Escoffier turns a free-text request ("quick breakfast with eggs") into a
//! persisted, reviewed recipe. Each run drafts a recipe with a model,
//! critiques it, repairs what the critique found and saves the result, with
//! every step retried under a named policy and bounded by a timeout. Runs
//! are queued durably so a crashed worker's runs are picked up again.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use escoffier::{EscoffierConfig, Stores, runtime};
//! use escoffier_workflow::StartRunRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EscoffierConfig::load()?;
//!     let stores = Stores::postgres(&config).await?;
//!     let service = runtime::service(&stores);
//!
//!     let started = service
//!         .start_run(
//!             StartRunRequest::builder()
//!                 .user_id("user_1")
//!                 .prompt("quick breakfast with eggs")
//!                 .build()?,
//!         )
//!         .await?;
//!     println!("{:?}", service.get_status(&started.run_id).await?);
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `observability` - export tracing spans through OpenTelemetry
//! - `database-tests` - enable tests that need a live PostgreSQL
//!
//! # Architecture
//!
//! - `escoffier_error` - Error types
//! - `escoffier_core` - Core data types (request, run state, recipe, call log)
//! - `escoffier_interface` - Driver, repository, call log and queue traits
//! - `escoffier_models` - Structured-output client and HTTP driver
//! - `escoffier_database` - PostgreSQL implementations
//! - `escoffier_workflow` - Retry policy, executors, coordinator, worker
//!
//! This crate (`escoffier`) adds configuration, logging and wiring.

mod config;
mod logging;
#[cfg(feature = "observability")]
mod observability;
pub mod runtime;

pub use config::{DatabaseConfig, ENV_PREFIX, EscoffierConfig, LoggingConfig, ModelConfig};
pub use logging::{env_filter, init_logging};
#[cfg(feature = "observability")]
pub use observability::{ObservabilityConfig, init_observability_with_config};
pub use runtime::Stores;
