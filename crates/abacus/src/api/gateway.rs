//! Model gateway: the boundary between the agent loop and a language model.
//!
//! The [`ModelGateway`] trait takes the transcript so far plus the tool
//! catalog and returns the model's next assistant message, which either
//! answers the user or requests tool calls. The gateway never runs tools.
//!
//! Failures are split in two: [`GatewayError::Transient`] (network errors,
//! timeouts, rate limits, 5xx) may be retried with backoff by the caller,
//! [`GatewayError::Fatal`] (missing credential, auth, quota, malformed
//! requests) must abort the run.

use super::retry;
use crate::{ChatRequest, Message, OpenAiClient, ToolCall, ToolDef, UsageInfo};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by a [`ModelGateway`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout, or provider overload. Eligible for retry.
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Authentication, quota, or request-shape failure. Never retried.
    #[error("fatal gateway error: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    /// Classify a transport error from `reqwest`.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Transient(format!("request timed out: {e}"))
        } else if e.is_builder() {
            GatewayError::Fatal(format!("invalid request: {e}"))
        } else {
            GatewayError::Transient(format!("request failed: {e}"))
        }
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let preview: String = body.chars().take(500).collect();
        let msg = format!("HTTP {status}: {preview}");
        if retry::is_transient_status(status) {
            GatewayError::Transient(msg)
        } else {
            GatewayError::Fatal(msg)
        }
    }

    /// Classify an error object embedded in an HTTP 200 response.
    pub fn from_provider_message(message: &str) -> Self {
        let msg = format!("provider error: {message}");
        if retry::is_transient_error(message) && !retry::is_permanent_error(message) {
            GatewayError::Transient(msg)
        } else {
            GatewayError::Fatal(msg)
        }
    }
}

/// One request to the model: which model, the transcript, and the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub transcript: &'a [Message],
    pub catalog: &'a [ToolDef],
}

/// The model's reply for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    /// Assistant message, with tool calls when the model wants tools.
    pub message: Message,
    pub usage: Option<UsageInfo>,
}

impl ModelResponse {
    /// Final answer with no tool calls.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant_text(text),
            usage: None,
        }
    }

    /// Assistant message requesting the given tool calls.
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::assistant(None, calls),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageInfo) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls()
    }
}

/// Boxed future returned by [`ModelGateway::complete`].
pub type GatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ModelResponse, GatewayError>> + Send + 'a>>;

/// A language-model backend that proposes the next assistant message.
///
/// Uses a boxed future so the trait stays dyn-compatible; the harness holds
/// a `&dyn ModelGateway` and tests swap in scripted fakes.
pub trait ModelGateway: Send + Sync {
    fn complete<'a>(&'a self, request: ModelRequest<'a>) -> GatewayFuture<'a>;
}

impl ModelGateway for OpenAiClient {
    fn complete<'a>(&'a self, request: ModelRequest<'a>) -> GatewayFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest {
                model: request.model.to_string(),
                messages: request.transcript.to_vec(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                tools: if request.catalog.is_empty() {
                    None
                } else {
                    Some(request.catalog.to_vec())
                },
                parallel_tool_calls: None,
            };
            let completion = self.chat(&body).await?;
            Ok(ModelResponse {
                message: Message::assistant(completion.content, completion.tool_calls),
                usage: completion.usage,
            })
        })
    }
}
