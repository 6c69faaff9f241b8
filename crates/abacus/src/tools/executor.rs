//! Tool executor: runs one batch of requested tool calls.
//!
//! Each call is looked up, its argument text parsed and validated against
//! the tool's schema, and the tool invoked (optionally under a timeout).
//! Every call yields exactly one [`ToolOutcome`]; the outcomes come back in
//! request order whether the batch ran concurrently or sequentially.
//! Failures never escape as errors: they become tool-error results the
//! model can read.

use super::core::{DEFAULT_MAX_RESULT_BYTES, ToolError, ToolRegistry, truncate_result, validate_tool_arguments};
use super::reflection::format_tool_failure;
use crate::{Message, ToolCall};
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default timeout for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-call timeout. `None` disables timeouts.
    pub timeout: Option<Duration>,
    /// Serialized results longer than this are truncated.
    pub max_result_bytes: usize,
    /// Run calls one at a time instead of concurrently.
    pub sequential: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            sequential: false,
        }
    }
}

impl ExecutorConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    pub fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: String,
    /// Serialized JSON result, or the error that replaced it.
    pub result: Result<String, ToolError>,
    pub elapsed: Duration,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }

    /// Whether the tool itself raised a fault (as opposed to a bad request).
    pub fn is_execution_fault(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_execution_fault())
    }

    /// Text of the tool result message.
    pub fn content(&self) -> String {
        match &self.result {
            Ok(text) => text.clone(),
            Err(e) => format_tool_failure(e, &self.arguments),
        }
    }

    /// Tool result message answering this call.
    pub fn into_message(self) -> Message {
        let content = self.content();
        Message::tool_result(self.call_id, content)
    }
}

/// Runs tool calls against a [`ToolRegistry`].
#[derive(Debug)]
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    config: ExecutorConfig,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a batch. Returns one outcome per call, in request order.
    pub async fn execute(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        if self.config.sequential || calls.len() < 2 {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.execute_one(call).await);
            }
            outcomes
        } else {
            // join_all yields outputs in input order.
            join_all(calls.iter().map(|call| self.execute_one(call))).await
        }
    }

    /// Run a single call through lookup, validation and invocation.
    pub async fn execute_one(&self, call: &ToolCall) -> ToolOutcome {
        let start = Instant::now();
        let result = self.run(call).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(text) => {
                debug!(
                    "Tool {} completed in {:.0}ms ({} bytes)",
                    call.name(),
                    elapsed.as_secs_f64() * 1000.0,
                    text.len()
                );
                trace!("Tool {} result: {text}", call.name());
            }
            Err(e) => warn!("Tool {} failed ({}): {e}", call.name(), e.kind()),
        }

        ToolOutcome {
            call_id: call.id.clone(),
            tool_name: call.name().to_string(),
            arguments: call.arguments().to_string(),
            result,
            elapsed,
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<String, ToolError> {
        let name = call.name();
        let tool = self.registry.lookup(name)?;

        let args = validate_tool_arguments(&tool.definition(), call.arguments()).map_err(
            |detail| ToolError::ArgumentValidation {
                name: name.to_string(),
                detail,
            },
        )?;

        log_tool_call(name, call.arguments());

        let execution = tool.execute(args);
        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(r) => r,
                Err(_) => Err(format!("timed out after {:.1}s", limit.as_secs_f64())),
            },
            None => execution.await,
        };

        let value = output.map_err(|detail| ToolError::Execution {
            name: name.to_string(),
            detail,
        })?;

        Ok(truncate_result(value.to_string(), self.config.max_result_bytes))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
}
