//! Model-facing layer: the gateway trait, retry policy, and correlation IDs.
//!
//! - [`gateway`]: [`ModelGateway`] trait, [`ModelRequest`] / [`ModelResponse`],
//!   and the [`GatewayError`] taxonomy (transient vs fatal). The
//!   [`OpenAiClient`](crate::OpenAiClient) implements the trait.
//! - [`retry`]: transient error detection (408, 429, 5xx, network timeouts)
//!   with configurable exponential backoff and jitter.
//! - [`trace`]: `trace_id` / `span_id` generation for log correlation.

pub mod gateway;
pub mod retry;
pub mod trace;

// Re-export commonly used items at the module level.
pub use gateway::{GatewayError, GatewayFuture, ModelGateway, ModelRequest, ModelResponse};
pub use retry::RetryConfig;
pub use trace::{generate_span_id, generate_trace_id};
