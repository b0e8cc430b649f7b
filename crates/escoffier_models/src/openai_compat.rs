//! Driver for OpenAI-compatible chat completion servers.

use async_trait::async_trait;
use derive_builder::Builder;
use derive_getters::Getters;
use escoffier_core::{CompletionRequest, CompletionResponse, Message};
use escoffier_error::{EscoffierResult, ModelsError, ModelsErrorKind};
use escoffier_interface::EscoffierDriver;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection settings for an OpenAI-compatible server.
#[derive(Debug, Clone, PartialEq, Builder, Getters)]
#[builder(setter(into))]
pub struct DriverSettings {
    /// Server root, with or without a trailing `/v1`
    base_url: String,
    /// Model identifier sent with every request
    model: String,
    /// Bearer token, if the server requires one
    #[builder(default)]
    api_key: Option<String>,
    /// Per-request HTTP timeout
    #[builder(default = "Duration::from_secs(120)")]
    request_timeout: Duration,
}

impl DriverSettings {
    /// Creates a new builder for `DriverSettings`.
    pub fn builder() -> DriverSettingsBuilder {
        DriverSettingsBuilder::default()
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// JSON-mode chat completions over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiCompatDriver {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatDriver {
    /// Creates a driver from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the model name is empty or the HTTP client cannot
    /// be built.
    #[instrument(skip_all, fields(model = %settings.model(), base_url = %settings.base_url()))]
    pub fn new(settings: &DriverSettings) -> EscoffierResult<Self> {
        if settings.model().trim().is_empty() {
            return Err(ModelsError::new(ModelsErrorKind::MissingConfiguration(
                "model name is empty".to_string(),
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(*settings.request_timeout())
            .build()
            .map_err(|e| {
                ModelsError::new(ModelsErrorKind::MissingConfiguration(format!(
                    "HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint(),
            model: settings.model().clone(),
            api_key: settings
                .api_key()
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(e: reqwest::Error) -> ModelsError {
        if e.is_timeout() {
            ModelsError::new(ModelsErrorKind::Timeout(e.to_string()))
        } else {
            ModelsError::new(ModelsErrorKind::Transport(e.to_string()))
        }
    }
}

#[async_trait]
impl EscoffierDriver for OpenAiCompatDriver {
    #[instrument(skip(self, req), fields(provider = "openai-compatible", model = %self.model, messages = req.messages.len()))]
    async fn generate(&self, req: &CompletionRequest) -> EscoffierResult<CompletionResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: &req.messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(url = %self.endpoint, "Sending chat completion request");

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(Self::transport_error)?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ModelsError::new(ModelsErrorKind::HttpStatus {
                status_code,
                message,
            })
            .into());
        }

        let parsed: ChatResponse = response.json().await.map_err(Self::transport_error)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ModelsError::new(ModelsErrorKind::EmptyResponse))?;

        debug!(response_length = content.len(), "Received chat completion");

        Ok(CompletionResponse { content })
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
