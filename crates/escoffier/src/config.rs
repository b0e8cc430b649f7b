//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (include_str! from escoffier.toml)
//! 2. `~/.config/escoffier/escoffier.toml`
//! 3. `./escoffier.toml`
//! 4. Environment variables such as `ESCOFFIER__WORKER__TASK_QUEUE`
//!
//! User files are optional and skipped when missing.

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use escoffier_error::{ConfigError, EscoffierResult, ModelsError, ModelsErrorKind};
use escoffier_models::{DEFAULT_REFORMULATION_RETRIES, DriverSettings};
use escoffier_workflow::{RetryPolicySettings, TimeoutSettings, WorkerSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../escoffier.toml");

/// Prefix of environment overrides. Nesting is separated by `__`.
pub const ENV_PREFIX: &str = "ESCOFFIER";

/// Top-level configuration.
///
/// # Example
///
/// ```no_run
/// use escoffier::EscoffierConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EscoffierConfig::load()?;
/// println!("Serving {}", config.worker.task_queue);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscoffierConfig {
    /// Worker runtime
    pub worker: WorkerSettings,
    /// Named retry policies
    pub retry: RetryPolicySettings,
    /// Per-step timeouts
    pub timeouts: TimeoutSettings,
    /// Model server
    pub model: ModelConfig,
    /// PostgreSQL
    pub database: DatabaseConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// OpenAI-compatible model server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Server root, e.g. a vLLM instance
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Bearer token, if the server wants one
    pub api_key: Option<String>,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Extra attempts when a reply does not match the expected shape
    pub reformulation_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            model: "Qwen/Qwen2.5-1.5B-Instruct-AWQ".to_string(),
            api_key: None,
            request_timeout_ms: 120_000,
            reformulation_retries: DEFAULT_REFORMULATION_RETRIES,
        }
    }
}

impl ModelConfig {
    /// Driver settings for this server.
    pub fn driver_settings(&self) -> EscoffierResult<DriverSettings> {
        DriverSettings::builder()
            .base_url(self.base_url.clone())
            .model(self.model.clone())
            .api_key(self.api_key.clone())
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
            .map_err(|e| {
                ModelsError::new(ModelsErrorKind::MissingConfiguration(e.to_string())).into()
            })
    }
}

/// PostgreSQL settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; `DATABASE_URL` is used when unset
    pub url: Option<String>,
    /// Connections kept in the pool
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

impl DatabaseConfig {
    /// The configured URL, or `DATABASE_URL`.
    pub fn database_url(&self) -> EscoffierResult<String> {
        if let Some(url) = self.url.as_ref().filter(|url| !url.trim().is_empty()) {
            return Ok(url.clone());
        }
        std::env::var("DATABASE_URL").map_err(|_| {
            ConfigError::new("database.url is not set and DATABASE_URL is not in the environment")
                .into()
        })
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
    /// Bridge spans to OpenTelemetry (needs the `observability` feature)
    pub opentelemetry: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            opentelemetry: false,
        }
    }
}

impl EscoffierConfig {
    /// Load with precedence: environment > current dir > home dir > bundled
    /// defaults.
    #[instrument]
    pub fn load() -> EscoffierResult<Self> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");
        dotenvy::dotenv().ok();

        let mut builder = defaults();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/escoffier/escoffier.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("escoffier").required(false));

        finish(builder.add_source(environment()))
    }

    /// Load bundled defaults, then `path`, then the environment.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> EscoffierResult<Self> {
        debug!("Loading configuration from file");
        dotenvy::dotenv().ok();

        let builder = defaults()
            .add_source(File::from(path.as_ref()))
            .add_source(environment());
        finish(builder)
    }

    /// Bundled defaults overlaid with a TOML document. Ignores the
    /// environment.
    pub fn from_toml_str(toml: &str) -> EscoffierResult<Self> {
        finish(defaults().add_source(File::from_str(toml, FileFormat::Toml)))
    }
}

fn defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> EscoffierResult<EscoffierConfig> {
    builder
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build configuration: {e}")))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_bundled_defaults_match_code_defaults() {
        let config = EscoffierConfig::from_toml_str("").expect("bundled config parses");
        assert_eq!(config.worker, WorkerSettings::default());
        assert_eq!(config.retry, RetryPolicySettings::default());
        assert_eq!(config.timeouts, TimeoutSettings::default());
        assert_eq!(config.model, ModelConfig::default());
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_user_file_overrides_single_keys() {
        let config = EscoffierConfig::from_toml_str(
            r#"
            [worker]
            worker_id = "kitchen-1"

            [retry.generative]
            initial_interval_ms = 250
            backoff_coefficient = 2.0
            max_attempts = 5
            max_interval_ms = 1000
            "#,
        )
        .expect("override parses");

        assert_eq!(config.worker.worker_id(), "kitchen-1");
        assert_eq!(config.worker.max_concurrent_workflow_tasks, 100);
        assert_eq!(config.retry.generative.max_attempts, 5);
        assert_eq!(config.retry.persistence.max_attempts, 3);
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        let vars = HashMap::from([
            ("ESCOFFIER__WORKER__LEASE_SECONDS".to_string(), "60".to_string()),
            ("ESCOFFIER__MODEL__API_KEY".to_string(), "secret".to_string()),
            ("ESCOFFIER__LOGGING__JSON".to_string(), "true".to_string()),
        ]);
        let config = finish(defaults().add_source(environment().source(Some(vars))))
            .expect("env overrides parse");

        assert_eq!(config.worker.lease_seconds, 60);
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
        assert!(config.logging.json);
    }

    #[test]
    fn test_driver_settings_from_model_config() {
        let settings = ModelConfig::default()
            .driver_settings()
            .expect("defaults are complete");
        assert_eq!(settings.model(), "Qwen/Qwen2.5-1.5B-Instruct-AWQ");
        assert_eq!(*settings.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_configured_database_url_wins() {
        let database = DatabaseConfig {
            url: Some("postgres://localhost/escoffier".to_string()),
            pool_size: 4,
        };
        assert_eq!(
            database.database_url().expect("url set"),
            "postgres://localhost/escoffier"
        );
    }
}
