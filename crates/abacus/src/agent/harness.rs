//! Agent harness: a bounded tool-use loop over a [`ModelGateway`].
//!
//! The [`Harness`] sends the transcript and tool catalog to the model,
//! executes any requested tool calls through the [`ToolExecutor`], commits
//! the round to the [`Transcript`], and repeats until the model answers
//! without calling a tool. The loop aborts on a fatal gateway error, an
//! exhausted retry budget, cancellation, repeated tool faults, or when the
//! iteration bound is reached.
//!
//! ```text
//!              ┌──────── results committed ────────┐
//!              v                                   │
//!   AwaitingModel ── tool calls ──> AwaitingTools ─┘
//!        │
//!        ├── no tool calls ──> Done
//!        └── fatal / limit / cancel ──> Aborted
//! ```

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent, NoopHandler};
use super::execution::{CallError, complete_with_retry, normalize_call_ids};
use super::outcome::{AbortReason, LoopState, RunError, RunOutcome, accumulate_usage};
use crate::api::gateway::{ModelGateway, ModelRequest, ModelResponse};
use crate::api::trace::{generate_span_id, generate_trace_id};
use crate::tools::core::ToolRegistry;
use crate::tools::executor::ToolExecutor;
use crate::transcript::Transcript;
use crate::{Message, UsageInfo};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where the controller goes after a model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No tool calls: the response is the final answer.
    Finish,
    /// Run `count` tool calls, then ask the model again.
    ExecuteTools { count: usize },
}

/// Transition function from a model response to the next step.
pub fn route(response: &ModelResponse) -> Route {
    match response.tool_calls().len() {
        0 => Route::Finish,
        count => Route::ExecuteTools { count },
    }
}

/// The bounded tool-use loop.
///
/// ```ignore
/// let client = OpenAiClient::new(std::env::var("OPENAI_API_KEY").ok())?;
/// let tools = ToolRegistry::new().with_arithmetic_tools()?;
/// let config = HarnessConfig::new("gpt-4o-mini", ARITHMETIC_SYSTEM_PROMPT);
///
/// let outcome = Harness::new(&client, &tools, config)
///     .run("add 3 and 4, then divide 10 by 2, then multiply the two results")
///     .await?;
/// println!("{}", outcome.text());
/// ```
///
/// # Lifetimes
///
/// `Harness<'a>` borrows the gateway, the tools, and the event handler.
/// Bind them to `let` bindings before building the harness so they outlive
/// the `.run()` call.
pub struct Harness<'a> {
    gateway: &'a dyn ModelGateway,
    tools: &'a ToolRegistry,
    config: HarnessConfig,
    event_handler: &'a dyn EventHandler,
    cancel: CancellationToken,
}

impl<'a> Harness<'a> {
    pub fn new(
        gateway: &'a dyn ModelGateway,
        tools: &'a ToolRegistry,
        config: HarnessConfig,
    ) -> Self {
        Self {
            gateway,
            tools,
            config,
            event_handler: &NoopHandler,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the event handler (builder pattern).
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Abort the run when `token` is cancelled (builder pattern).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels this harness's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one task: seed the transcript with the system prompt and `task`,
    /// then loop until the model answers.
    pub async fn run(&self, task: &str) -> Result<RunOutcome, RunError> {
        let transcript = Transcript::new(self.config.system_prompt.as_deref(), task);
        self.drive(transcript, generate_trace_id()).await
    }

    /// Run from an existing history (system prompt and user turns included).
    /// The history must not hold unanswered tool calls; a rejected history
    /// comes back unchanged in [`RunError::transcript`].
    pub async fn run_with_messages(&self, messages: Vec<Message>) -> Result<RunOutcome, RunError> {
        let trace_id = generate_trace_id();
        match Transcript::from_messages(messages) {
            Ok(transcript) => self.drive(transcript, trace_id).await,
            Err(rejected) => {
                let (error, history) = rejected.into_parts();
                Err(self.abort(LoopState::AwaitingModel, error.into(), history, 0, trace_id))
            }
        }
    }

    async fn drive(&self, mut transcript: Transcript, trace_id: String) -> Result<RunOutcome, RunError> {
        let started_at = Utc::now();
        let catalog = self.tools.describe_all();
        let executor = ToolExecutor::new(self.tools, self.config.executor.clone());
        let max_iterations = self.config.max_iterations;

        let mut state = LoopState::AwaitingModel;
        let mut usage = UsageInfo::default();
        let mut iterations: u32 = 0;
        let mut consecutive_faults: u32 = 0;

        info!(
            "Harness run started: trace_id={trace_id}, model={}, tools={}, max_iterations={max_iterations}",
            self.config.model,
            catalog.len(),
        );

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.abort(state, AbortReason::Cancelled, transcript, iterations, trace_id));
            }
            if iterations >= max_iterations {
                let reason = AbortReason::IterationLimitExceeded {
                    limit: max_iterations,
                };
                return Err(self.abort(state, reason, transcript, iterations, trace_id));
            }

            iterations += 1;
            let span_id = generate_span_id(&trace_id, iterations);
            self.event_handler.on_event(&HarnessEvent::RoundStart {
                iteration: iterations,
                max_iterations,
                transcript_len: transcript.len(),
            });

            let request = ModelRequest {
                model: &self.config.model,
                transcript: transcript.messages(),
                catalog: &catalog,
            };
            let mut response = match complete_with_retry(
                self.gateway,
                request,
                &self.config.retry,
                &self.cancel,
                self.event_handler,
            )
            .await
            {
                Ok(response) => response,
                Err(CallError::Cancelled) => {
                    return Err(self.abort(state, AbortReason::Cancelled, transcript, iterations, trace_id));
                }
                Err(CallError::Failed { error, attempts }) => {
                    let reason = AbortReason::Gateway { error, attempts };
                    return Err(self.abort(state, reason, transcript, iterations, trace_id));
                }
            };

            if let Some(round_usage) = &response.usage {
                accumulate_usage(&mut usage, round_usage);
                self.event_handler.on_event(&HarnessEvent::TokenUsage {
                    prompt_tokens: round_usage.prompt_tokens.unwrap_or(0),
                    completion_tokens: round_usage.completion_tokens.unwrap_or(0),
                });
            }
            if !response.message.text().is_empty() {
                self.event_handler
                    .on_event(&HarnessEvent::Text(response.message.text()));
            }

            let rekeyed = normalize_call_ids(&mut response.message, &transcript, &trace_id, iterations);
            if rekeyed > 0 {
                debug!("[{span_id}] re-keyed {rekeyed} tool call id(s)");
            }

            let count = match route(&response) {
                Route::Finish => {
                    let final_message = response.message;
                    if let Err(e) = transcript.push_final(final_message.clone()) {
                        return Err(self.abort(state, e.into(), transcript, iterations, trace_id));
                    }
                    self.transition(&mut state, LoopState::Done);
                    self.event_handler
                        .on_event(&HarnessEvent::Finished { iterations });
                    info!(
                        "Harness run completed: trace_id={trace_id}, iterations={iterations}, tokens={}",
                        usage.total_tokens.unwrap_or(0)
                    );
                    return Ok(RunOutcome {
                        final_message,
                        transcript,
                        iterations,
                        usage,
                        trace_id,
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
                Route::ExecuteTools { count } => count,
            };

            self.event_handler.on_event(&HarnessEvent::ToolCallsReceived {
                iteration: iterations,
                count,
            });
            self.transition(&mut state, LoopState::AwaitingTools);

            if self.cancel.is_cancelled() {
                return Err(self.abort(state, AbortReason::Cancelled, transcript, iterations, trace_id));
            }
            for call in response.tool_calls() {
                self.event_handler.on_event(&HarnessEvent::ToolExecuting {
                    name: call.name(),
                    arguments: call.arguments(),
                });
            }

            // A cancelled round is dropped whole: its assistant message is
            // never committed, so no call is left without a result.
            let outcomes = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("[{span_id}] discarding in-flight round of {count} call(s)");
                    return Err(self.abort(state, AbortReason::Cancelled, transcript, iterations, trace_id));
                }
                outcomes = executor.execute(response.tool_calls()) => outcomes,
            };

            for outcome in &outcomes {
                if outcome.is_execution_fault() {
                    consecutive_faults += 1;
                } else if !outcome.is_error() {
                    consecutive_faults = 0;
                }
                let content = outcome.content();
                self.event_handler.on_event(&HarnessEvent::ToolResult {
                    name: &outcome.tool_name,
                    call_id: &outcome.call_id,
                    result: &content,
                    is_error: outcome.is_error(),
                });
            }

            let results = outcomes.into_iter().map(|o| o.into_message()).collect();
            if let Err(e) = transcript.commit_round(response.message, results) {
                return Err(self.abort(state, e.into(), transcript, iterations, trace_id));
            }
            debug_assert!(transcript.unanswered_calls().is_empty());

            if consecutive_faults > self.config.tool_failure_budget {
                let reason = AbortReason::ToolFailuresExceeded {
                    count: consecutive_faults,
                    budget: self.config.tool_failure_budget,
                };
                return Err(self.abort(state, reason, transcript, iterations, trace_id));
            }

            self.transition(&mut state, LoopState::AwaitingModel);
        }
    }

    fn transition(&self, state: &mut LoopState, to: LoopState) {
        let from = *state;
        *state = to;
        self.event_handler
            .on_event(&HarnessEvent::StateChanged { from, to });
    }

    fn abort(
        &self,
        from: LoopState,
        reason: AbortReason,
        transcript: Transcript,
        iterations: u32,
        trace_id: String,
    ) -> RunError {
        info!(
            "Harness run aborted: trace_id={trace_id}, iterations={iterations}, reason={}",
            reason.kind()
        );
        self.event_handler.on_event(&HarnessEvent::StateChanged {
            from,
            to: LoopState::Aborted,
        });
        self.event_handler
            .on_event(&HarnessEvent::Aborted { reason: &reason });
        RunError {
            reason,
            transcript,
            iterations,
            trace_id,
        }
    }
}
