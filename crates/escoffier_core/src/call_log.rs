//! Append-only record of generative-model calls.

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which generative step produced a log entry.
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
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogStep {
    /// Draft generation
    Generate,
    /// Quality review
    Review,
    /// Issue repair
    Fix,
}

/// One generative-model invocation. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct CallLogEntry {
    /// Entry id
    #[builder(default = "Uuid::new_v4()")]
    pub id: Uuid,
    /// Owning run
    pub run_id: String,
    /// Target recipe
    pub recipe_id: Uuid,
    /// Step that made the call
    pub step: LogStep,
    /// System prompt sent
    pub system_prompt: String,
    /// User prompt sent
    pub user_prompt: String,
    /// Raw model output, empty when the call never returned
    #[builder(default)]
    pub raw_response: String,
    /// Parsed output, `None` on failure
    #[builder(default)]
    pub parsed_response: Option<serde_json::Value>,
    /// Whether the call produced a usable result
    pub success: bool,
    /// Error text on failure
    #[builder(default)]
    pub error: Option<String>,
    /// Wall-clock duration of the call
    pub duration_ms: i64,
    /// Model identifier
    pub model: String,
    /// Insertion time
    #[builder(default = "Utc::now()")]
    pub created_at: DateTime<Utc>,
}

impl CallLogEntry {
    /// Create a builder for a log entry.
    pub fn builder() -> CallLogEntryBuilder {
        CallLogEntryBuilder::default()
    }
}
