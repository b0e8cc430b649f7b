//! Driver that answers each generative step from its own script.

use async_trait::async_trait;
use escoffier_core::{CompletionRequest, CompletionResponse, Role};
use escoffier_error::{EscoffierResult, ModelsError, ModelsErrorKind};
use escoffier_interface::EscoffierDriver;
use escoffier_workflow::{FIX_SYSTEM, GENERATE_SYSTEM, REVIEW_SYSTEM};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Which step a request belongs to, judged by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Generate,
    Review,
    Fix,
}

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(ModelsErrorKind),
    /// Never answers; the step timeout has to cut it off
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    calls: usize,
}

/// Scripted driver. Queued answers are used first, then the fallback.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    scripts: Mutex<HashMap<Route, Script>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call on `route` with `answer` once the queue is empty.
    pub fn always(self, route: Route, answer: Scripted) -> Self {
        self.scripts.lock().entry(route).or_default().fallback = Some(answer);
        self
    }

    /// Queue answers for `route`.
    pub fn then(self, route: Route, answers: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .entry(route)
            .or_default()
            .queued
            .extend(answers);
        self
    }

    /// Hold every call until `gate` hands out a permit. Permits are consumed.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Calls received on `route`.
    pub fn calls(&self, route: Route) -> usize {
        self.scripts
            .lock()
            .get(&route)
            .map(|script| script.calls)
            .unwrap_or(0)
    }

    fn next_answer(&self, route: Route) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let script = scripts.entry(route).or_default();
        script.calls += 1;
        script.queued.pop_front().or_else(|| script.fallback.clone())
    }
}

fn route_of(req: &CompletionRequest) -> Option<Route> {
    let system = req
        .messages
        .iter()
        .find(|message| message.role == Role::System)?;
    if system.content.starts_with(GENERATE_SYSTEM) {
        Some(Route::Generate)
    } else if system.content.starts_with(REVIEW_SYSTEM) {
        Some(Route::Review)
    } else if system.content.starts_with(FIX_SYSTEM) {
        Some(Route::Fix)
    } else {
        None
    }
}

#[async_trait]
impl EscoffierDriver for ScriptedDriver {
    async fn generate(&self, req: &CompletionRequest) -> EscoffierResult<CompletionResponse> {
        let answer = route_of(req).and_then(|route| self.next_answer(route));
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }

        match answer {
            Some(Scripted::Reply(content)) => Ok(CompletionResponse { content }),
            Some(Scripted::Fail(kind)) => Err(ModelsError::new(kind).into()),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Err(ModelsError::new(ModelsErrorKind::Timeout("unreachable".into())).into())
            }
            None => Err(ModelsError::new(ModelsErrorKind::Transport(
                "no scripted answer".to_string(),
            ))
            .into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}
