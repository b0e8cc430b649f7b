//! Chat completion request and response types.

use serde::{Deserialize, Serialize};

/// Conversation participant.
///
/// # Examples
///
/// ```
/// use escoffier_core::Role;
///
/// assert_eq!(format!("{}", Role::System), "system");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    #[display("system")]
    System,
    /// Caller input
    #[display("user")]
    User,
    /// Prior model output
    #[display("assistant")]
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Message {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A JSON-mode completion request sent to a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompletionRequest {
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Text returned by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw model output
    pub content: String,
}
