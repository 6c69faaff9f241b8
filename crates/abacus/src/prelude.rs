//! Convenience re-exports for common `abacus` types.
//!
//! ```ignore
//! use abacus::prelude::*;
//! ```
//!
//! Pulls in the client, message types, the [`Harness`] with its config and
//! event handlers, the tool traits and registry, and the transcript.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole, OpenAiClient, ToolCall, ToolDef, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    ARITHMETIC_SYSTEM_PROMPT, AbortReason, CompositeEventHandler, DEFAULT_TASK, EventHandler,
    FnEventHandler, Harness, HarnessConfig, HarnessEvent, LoggingHandler, NoopHandler, RunError,
    RunOutcome,
};

// ── Model gateway ───────────────────────────────────────────────────
pub use crate::api::{GatewayError, ModelGateway, ModelResponse, RetryConfig};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{ExecutorConfig, FnTool, Tool, ToolError, ToolFuture, ToolRegistry};

// ── Transcript ──────────────────────────────────────────────────────
pub use crate::transcript::Transcript;

// Cancellation handle accepted by `Harness::with_cancellation`.
pub use tokio_util::sync::CancellationToken;
