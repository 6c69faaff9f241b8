//! Events and handlers for the [`Harness`](super::harness::Harness).
//!
//! The harness reports its progress through [`HarnessEvent`] variants, from
//! iteration start through tool execution to completion or abort. Callers
//! implement [`EventHandler`] to observe them for logging, progress output,
//! or test assertions. Handlers only observe; they cannot steer the run.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use super::outcome::{AbortReason, LoopState};
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the harness during a run.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// A model call is about to be made.
    RoundStart {
        iteration: u32,
        max_iterations: u32,
        transcript_len: usize,
    },
    /// The controller moved between loop states.
    StateChanged { from: LoopState, to: LoopState },
    /// The model returned text (may accompany tool calls).
    Text(&'a str),
    /// The model requested tool calls this iteration.
    ToolCallsReceived { iteration: u32, count: usize },
    /// A tool call is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A tool call finished; `result` is the text sent back to the model.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
        is_error: bool,
    },
    /// Token usage reported by the provider for this iteration.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// A transient gateway failure will be retried after `delay`.
    GatewayRetry {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
        error: &'a str,
    },
    /// The model answered without tool calls.
    Finished { iterations: u32 },
    /// The run stopped without a final answer.
    Aborted { reason: &'a AbortReason },
}

impl HarnessEvent<'_> {
    /// Total tokens of a `TokenUsage` event, `None` for all others.
    pub fn total_tokens(&self) -> Option<u64> {
        if let HarnessEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
        } = self
        {
            Some(*prompt_tokens as u64 + *completion_tokens as u64)
        } else {
            None
        }
    }
}

/// Handler for harness events.
///
/// # Example
///
/// ```ignore
/// struct Progress;
///
/// impl EventHandler for Progress {
///     fn on_event(&self, event: &HarnessEvent<'_>) {
///         if let HarnessEvent::ToolResult { name, result, .. } = event {
///             eprintln!("{name} -> {result}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event during the run. The default ignores it.
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let HarnessEvent::Text(text) = event {
///         println!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &HarnessEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that forwards every event to several inner handlers,
/// in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(show_progress, progress_handler);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::RoundStart {
                iteration,
                max_iterations,
                transcript_len,
            } => {
                info!("[iteration {iteration}/{max_iterations}] transcript={transcript_len} messages");
            }
            HarnessEvent::StateChanged { from, to } => {
                debug!("State: {from} -> {to}");
            }
            HarnessEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "Model text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            HarnessEvent::ToolCallsReceived { iteration, count } => {
                debug!("{count} tool call(s) in iteration {iteration}");
            }
            HarnessEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            HarnessEvent::ToolResult {
                name,
                result,
                is_error,
                ..
            } => {
                if *is_error {
                    info!("Tool {name} returned an error ({} bytes)", result.len());
                } else {
                    debug!("Tool {name} result: {result}");
                }
            }
            HarnessEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            HarnessEvent::GatewayRetry {
                attempt,
                max_retries,
                delay,
                error,
            } => {
                warn!("Transient gateway error (attempt {attempt}/{max_retries}): {error}. Retrying in {delay:?}...");
            }
            HarnessEvent::Finished { iterations } => {
                info!("Agent finished after {iterations} iteration(s)");
            }
            HarnessEvent::Aborted { reason } => {
                warn!("Agent aborted: {reason}");
            }
        }
    }
}
