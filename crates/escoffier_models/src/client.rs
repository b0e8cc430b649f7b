//! Generation client with an inner reformulation loop.

use escoffier_core::{CompletionRequest, Message, StructuredOutput};
use escoffier_error::{EscoffierResult, ModelsError, ModelsErrorKind};
use escoffier_interface::EscoffierDriver;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Extra completions requested when output fails validation.
pub const DEFAULT_REFORMULATION_RETRIES: u32 = 2;

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CallParams {
    /// Create call parameters.
    pub const fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

/// A parsed, validated model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    /// Parsed output
    pub value: T,
    /// Raw text of the accepted reply
    pub raw: String,
    /// Completions requested, including reformulations
    pub attempts: u32,
}

/// System prompt with the JSON shape of `T` appended.
///
/// Callers log the returned string so the call log records exactly what was
/// sent.
pub fn structured_system_prompt<T: StructuredOutput>(base: &str) -> String {
    let shape = serde_json::to_string_pretty(&T::shape()).unwrap_or_default();
    format!(
        "{base}\n\nRespond with a single JSON object and nothing else. It must match this shape:\n{shape}"
    )
}

/// Parse and validate a raw reply.
///
/// Markdown code fences around the JSON are tolerated.
pub fn parse_output<T: StructuredOutput>(raw: &str) -> Result<T, String> {
    let trimmed = strip_code_fence(raw.trim());
    let value: T = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Typed access to a model through a driver.
///
/// Constructed explicitly and handed to each step executor.
#[derive(Clone)]
pub struct GenerationClient {
    driver: Arc<dyn EscoffierDriver>,
    reformulation_retries: u32,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.driver.provider_name())
            .field("model", &self.driver.model_name())
            .field("reformulation_retries", &self.reformulation_retries)
            .finish()
    }
}

impl GenerationClient {
    /// Wrap a driver with the default reformulation budget.
    pub fn new(driver: Arc<dyn EscoffierDriver>) -> Self {
        Self {
            driver,
            reformulation_retries: DEFAULT_REFORMULATION_RETRIES,
        }
    }

    /// Override the number of reformulation retries.
    pub fn with_reformulation_retries(mut self, retries: u32) -> Self {
        self.reformulation_retries = retries;
        self
    }

    /// Model identifier of the underlying driver.
    pub fn model_name(&self) -> &str {
        self.driver.model_name()
    }

    /// Request a `T` from the model.
    ///
    /// Driver errors are returned immediately; they belong to the caller's
    /// retry policy. Output that fails to parse or validate is sent back to
    /// the model with a correction, up to the reformulation budget, after
    /// which a `SchemaValidation` error is returned.
    #[instrument(skip(self, system, user), fields(model = %self.driver.model_name(), output = std::any::type_name::<T>()))]
    pub async fn complete<T: StructuredOutput>(
        &self,
        system: &str,
        user: &str,
        params: CallParams,
    ) -> EscoffierResult<Completion<T>> {
        let mut request = CompletionRequest {
            messages: vec![Message::system(system), Message::user(user)],
            max_tokens: Some(params.max_tokens),
            temperature: Some(params.temperature),
        };

        let max_attempts = self.reformulation_retries + 1;
        let mut last_problem = String::new();

        for attempt in 1..=max_attempts {
            let response = self.driver.generate(&request).await?;

            match parse_output::<T>(&response.content) {
                Ok(value) => {
                    debug!(attempt, "Structured output accepted");
                    return Ok(Completion {
                        value,
                        raw: response.content,
                        attempts: attempt,
                    });
                }
                Err(problem) => {
                    warn!(attempt, max_attempts, error = %problem, "Output failed validation");
                    request.messages.push(Message::assistant(response.content));
                    request.messages.push(Message::user(format!(
                        "Your previous reply was not valid: {problem}. \
                         Reply again with only the corrected JSON object."
                    )));
                    last_problem = problem;
                }
            }
        }

        Err(ModelsError::new(ModelsErrorKind::SchemaValidation {
            attempts: max_attempts,
            message: last_problem,
        })
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("{}"), "{}");
    }
}
