//! Configuration for the [`Harness`](super::harness::Harness).
//!
//! ```ignore
//! let config = HarnessConfig::new("gpt-4o-mini", ARITHMETIC_SYSTEM_PROMPT)
//!     .with_max_iterations(10)
//!     .with_retries(5)
//!     .with_sequential_tools(true);
//! ```
//!
//! Nested settings can also be replaced with struct update syntax:
//!
//! ```ignore
//! let config = HarnessConfig {
//!     retry: RetryConfig::immediate(2),
//!     ..HarnessConfig::new("gpt-4o-mini", "You are helpful.")
//! };
//! ```

use crate::api::retry::RetryConfig;
use crate::tools::executor::ExecutorConfig;
use std::time::Duration;

/// Default bound on model calls per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Default number of consecutive tool execution faults tolerated.
pub const DEFAULT_TOOL_FAILURE_BUDGET: u32 = 5;

/// Configuration for a [`Harness`](super::harness::Harness) run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Model identifier passed to the gateway.
    pub model: String,
    /// System instruction seeded before the user task. `None` sends none.
    pub system_prompt: Option<String>,
    /// Maximum number of model calls. A call beyond this is never made.
    pub max_iterations: u32,
    /// Retry policy for transient gateway failures.
    pub retry: RetryConfig,
    /// Tool execution settings.
    pub executor: ExecutorConfig,
    /// Consecutive tool execution faults tolerated before the run aborts.
    pub tool_failure_budget: u32,
}

impl HarnessConfig {
    /// Create a config with a model and system prompt.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: Some(system_prompt.into()),
            ..Default::default()
        }
    }

    /// Set the maximum number of model calls.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the number of retries for transient gateway failures.
    /// Pass `0` to fail on the first error.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replace the whole retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the calls of a round one at a time.
    pub fn with_sequential_tools(mut self, sequential: bool) -> Self {
        self.executor.sequential = sequential;
        self
    }

    /// Bound each tool call. `None` disables the timeout.
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor.timeout = timeout;
        self
    }

    /// Set how many consecutive tool execution faults are tolerated.
    pub fn with_tool_failure_budget(mut self, budget: u32) -> Self {
        self.tool_failure_budget = budget;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retry: RetryConfig::default(),
            executor: ExecutorConfig::default(),
            tool_failure_budget: DEFAULT_TOOL_FAILURE_BUDGET,
        }
    }
}
