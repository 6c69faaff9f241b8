//! Settings for the `abacus` binary.
//!
//! [`AbacusConfig`] captures what one command-line run needs and converts it
//! into library types: a [`HarnessConfig`], a [`ToolRegistry`] holding the
//! arithmetic tools, and an [`OpenAiClient`].

use crate::agent::config::{DEFAULT_MAX_ITERATIONS, HarnessConfig};
use crate::agent::prompt::{ARITHMETIC_SYSTEM_PROMPT, DEFAULT_TASK};
use crate::api::gateway::GatewayError;
use crate::tools::core::{ToolError, ToolRegistry};
use crate::{API_KEY_ENV, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT, OPENAI_BASE_URL, OpenAiClient};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one arithmetic agent run.
#[derive(Debug, Clone)]
pub struct AbacusConfig {
    /// The task sent as the user message.
    pub prompt: String,
    /// Model identifier. Default: `"gpt-4o-mini"`.
    pub model: String,
    /// Chat completions base URL. Default: the OpenAI API.
    pub base_url: String,
    /// Environment variable holding the credential. Default: `OPENAI_API_KEY`.
    pub api_key_env: String,
    /// Maximum model calls. Default: `25`.
    pub max_iterations: u32,
    /// Retries for transient gateway failures. Default: `3`.
    pub retries: u32,
    /// Completion token cap; `0` leaves it to the provider.
    pub max_tokens: u32,
    /// Sampling temperature; `None` leaves it to the provider.
    pub temperature: Option<f32>,
    /// Per-request timeout for model calls.
    pub request_timeout: Duration,
    /// Run tool calls of a round one at a time.
    pub sequential_tools: bool,
}

impl Default for AbacusConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_TASK.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key_env: API_KEY_ENV.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retries: 3,
            max_tokens: 0,
            temperature: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sequential_tools: false,
        }
    }
}

impl AbacusConfig {
    /// Build a [`HarnessConfig`] with the arithmetic system prompt.
    pub fn build_harness_config(&self) -> HarnessConfig {
        HarnessConfig::new(self.model.clone(), ARITHMETIC_SYSTEM_PROMPT)
            .with_max_iterations(self.max_iterations)
            .with_retries(self.retries)
            .with_sequential_tools(self.sequential_tools)
    }

    /// Build a [`ToolRegistry`] with `add`, `multiply` and `divide`.
    pub fn build_tool_registry(&self) -> Result<ToolRegistry, ToolError> {
        ToolRegistry::new().with_arithmetic_tools()
    }

    /// Read the credential from the environment. Missing or empty is `None`.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Build the model client. A missing credential is not an error here;
    /// the first model call fails fatally instead.
    pub fn build_client(&self) -> Result<OpenAiClient, GatewayError> {
        let mut client =
            OpenAiClient::with_options(self.api_key(), &self.base_url, self.request_timeout)?
                .with_max_tokens(self.max_tokens);
        if let Some(t) = self.temperature {
            client = client.with_temperature(t);
        }
        Ok(client)
    }
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
///
/// With no `path`, looks for `.env` in the current directory and its
/// parents. Variables that are already set keep their values. Returns the
/// file that was read; a missing or unreadable file yields `None`.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|()| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    loaded.ok()
}
