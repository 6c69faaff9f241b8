//! Shared fakes for the agent loop integration tests.

#![allow(dead_code)]

use abacus::api::gateway::{GatewayError, GatewayFuture, ModelGateway, ModelRequest, ModelResponse};
use abacus::prelude::*;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply from [`ScriptedGateway`].
pub enum Step {
    Respond(ModelResponse),
    Fail(GatewayError),
    /// Never resolve; only cancellation ends the call.
    Hang,
}

/// A gateway that replays a fixed script and records every request.
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    /// Returned once the script runs out. `None` fails fatally instead.
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same response.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Transcripts sent with each request, in order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ModelGateway for ScriptedGateway {
    fn complete<'a>(&'a self, request: ModelRequest<'a>) -> GatewayFuture<'a> {
        self.requests
            .lock()
            .unwrap()
            .push(request.transcript.to_vec());
        let step = self.steps.lock().unwrap().pop_front();
        Box::pin(async move {
            match step {
                Some(Step::Respond(response)) => Ok(response),
                Some(Step::Fail(error)) => Err(error),
                Some(Step::Hang) => std::future::pending().await,
                None => self
                    .repeat
                    .clone()
                    .ok_or_else(|| GatewayError::Fatal("script exhausted".into())),
            }
        })
    }
}

/// Shorthand for a tool call with JSON arguments.
pub fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

pub fn respond_calls(calls: Vec<ToolCall>) -> Step {
    Step::Respond(ModelResponse::calls(calls))
}

pub fn respond_answer(text: &str) -> Step {
    Step::Respond(ModelResponse::answer(text))
}

/// Event handler that keeps a short label for every event.
#[derive(Default)]
pub struct Recorder {
    labels: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.labels()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

impl EventHandler for Recorder {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let label = match event {
            HarnessEvent::RoundStart { iteration, .. } => format!("round:{iteration}"),
            HarnessEvent::StateChanged { to, .. } => format!("state:{to}"),
            HarnessEvent::Text(_) => "text".into(),
            HarnessEvent::ToolCallsReceived { count, .. } => format!("calls:{count}"),
            HarnessEvent::ToolExecuting { name, .. } => format!("executing:{name}"),
            HarnessEvent::ToolResult { name, is_error, .. } => {
                format!("result:{name}:{}", if *is_error { "err" } else { "ok" })
            }
            HarnessEvent::TokenUsage { .. } => "usage".into(),
            HarnessEvent::GatewayRetry { attempt, .. } => format!("retry:{attempt}"),
            HarnessEvent::Finished { .. } => "finished".into(),
            HarnessEvent::Aborted { reason } => format!("aborted:{}", reason.kind()),
        };
        self.labels.lock().unwrap().push(label);
    }
}

/// A tool that cancels the run and then never finishes.
pub struct CancellingTool(pub CancellationToken);

impl Tool for CancellingTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "cancel_run",
            "Cancels the run, then hangs",
            json!({"type": "object", "properties": {}}),
        )
    }

    fn execute(&self, _arguments: Value) -> ToolFuture<'_> {
        let token = self.0.clone();
        Box::pin(async move {
            token.cancel();
            std::future::pending::<()>().await;
            Ok(Value::Null)
        })
    }
}

pub fn arithmetic_tools() -> ToolRegistry {
    ToolRegistry::new().with_arithmetic_tools().unwrap()
}

/// Harness settings for tests: no retry delays.
pub fn test_config() -> HarnessConfig {
    HarnessConfig::new("test-model", ARITHMETIC_SYSTEM_PROMPT).with_retry(RetryConfig::immediate(3))
}
