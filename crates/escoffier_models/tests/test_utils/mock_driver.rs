//! Mock driver for testing.

use async_trait::async_trait;
use escoffier_core::{CompletionRequest, CompletionResponse};
use escoffier_error::{EscoffierError, EscoffierResult, ModelsError, ModelsErrorKind};
use escoffier_interface::EscoffierDriver;
use parking_lot::Mutex;
use std::sync::Arc;

/// A single mock response (success or error).
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    Error(ModelsErrorKind),
}

/// Driver that replays a fixed sequence of responses and records requests.
pub struct MockDriver {
    responses: Vec<MockResponse>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockDriver {
    /// Create a mock driver with a sequence of responses.
    pub fn new_sequence(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the number of times generate() was called.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EscoffierDriver for MockDriver {
    async fn generate(&self, req: &CompletionRequest) -> EscoffierResult<CompletionResponse> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(req.clone());
            requests.len() - 1
        };

        match self.responses.get(index) {
            Some(MockResponse::Success(text)) => Ok(CompletionResponse {
                content: text.clone(),
            }),
            Some(MockResponse::Error(kind)) => {
                Err(EscoffierError::from(ModelsError::new(kind.clone())))
            }
            None => Err(EscoffierError::from(ModelsError::new(
                ModelsErrorKind::Transport(format!(
                    "Mock sequence exhausted (call {} beyond {} responses)",
                    index + 1,
                    self.responses.len()
                )),
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
