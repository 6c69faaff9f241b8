//! Terminal results of a harness run.
//!
//! A run ends in exactly one of two ways: [`RunOutcome`] when the model
//! produced a final answer, or [`RunError`] when the loop aborted. Both carry
//! the transcript as it stood at the end.

use crate::api::gateway::GatewayError;
use crate::transcript::{Transcript, TranscriptError};
use crate::{Message, UsageInfo};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// States of the agent loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingTools,
    Done,
    Aborted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::AwaitingModel => "awaiting_model",
            LoopState::AwaitingTools => "awaiting_tools",
            LoopState::Done => "done",
            LoopState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Why a run aborted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// The gateway failed fatally, or kept failing transiently until the
    /// retry budget ran out.
    #[error("model gateway failed after {attempts} attempt(s): {error}")]
    Gateway { error: GatewayError, attempts: u32 },

    /// The model kept requesting tools past the iteration bound.
    #[error("iteration limit of {limit} exceeded")]
    IterationLimitExceeded { limit: u32 },

    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,

    /// Too many consecutive tool execution faults.
    #[error("{count} consecutive tool failures (budget {budget})")]
    ToolFailuresExceeded { count: u32, budget: u32 },

    /// A round could not be committed to the transcript.
    #[error("invalid round: {0}")]
    InvalidRound(#[from] TranscriptError),
}

impl AbortReason {
    /// Short machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            AbortReason::Gateway { error, .. } if error.is_transient() => "gateway_transient",
            AbortReason::Gateway { .. } => "gateway_fatal",
            AbortReason::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            AbortReason::Cancelled => "cancelled",
            AbortReason::ToolFailuresExceeded { .. } => "tool_failures_exceeded",
            AbortReason::InvalidRound(_) => "invalid_round",
        }
    }
}

/// A run that ended without a final answer.
#[derive(Error, Debug, Clone)]
#[error("agent run {trace_id} aborted after {iterations} iteration(s): {reason}")]
pub struct RunError {
    #[source]
    pub reason: AbortReason,
    /// Transcript at the point of failure. Never holds an unanswered call,
    /// except for a seeded history that was rejected as given.
    pub transcript: Transcript,
    pub iterations: u32,
    pub trace_id: String,
}

/// A run that ended with the model's final answer.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The last assistant message (no tool calls).
    pub final_message: Message,
    pub transcript: Transcript,
    /// Number of model calls that returned a response.
    pub iterations: u32,
    /// Token usage summed over all iterations that reported it.
    pub usage: UsageInfo,
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Text of the final answer.
    pub fn text(&self) -> &str {
        self.final_message.text()
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Add `other` into `total`, treating missing counts as zero.
pub(crate) fn accumulate_usage(total: &mut UsageInfo, other: &UsageInfo) {
    fn add(a: Option<u32>, b: Option<u32>) -> Option<u32> {
        match (a, b) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
        }
    }
    total.prompt_tokens = add(total.prompt_tokens, other.prompt_tokens);
    total.completion_tokens = add(total.completion_tokens, other.completion_tokens);
    total.total_tokens = add(total.total_tokens, other.total_tokens);
}
