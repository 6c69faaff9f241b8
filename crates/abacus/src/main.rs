//! Run one arithmetic task through the tool-use agent loop.
//!
//! Reads the API key from `OPENAI_API_KEY` (or the variable named by
//! `--api-key-env`), falling back to a `.env` file, lets the model call
//! `add`, `multiply` and `divide` until it answers, and prints the
//! transcript.
//!
//! # Examples
//!
//! ```sh
//! # The default demo task
//! abacus
//!
//! # A custom task, transcript as JSON
//! abacus --prompt "What is (12 + 30) / 7?" --json
//!
//! # A local OpenAI-compatible server, debug logging
//! abacus --base-url http://localhost:8080/v1 --model llama3 --verbose
//! ```

use abacus::config::{AbacusConfig, load_env_file};
use abacus::prelude::*;
use clap::Parser;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run one arithmetic task through the tool-use agent loop.
#[derive(Parser)]
#[command(name = "abacus", version)]
struct Cli {
    /// Task sent to the model
    #[arg(long, default_value = DEFAULT_TASK)]
    prompt: String,

    /// Model to use for completions
    #[arg(long, default_value = abacus::DEFAULT_MODEL)]
    model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, default_value = abacus::OPENAI_BASE_URL)]
    base_url: String,

    /// Environment variable holding the API key
    #[arg(long, default_value = abacus::API_KEY_ENV)]
    api_key_env: String,

    /// Maximum model calls before the run aborts
    #[arg(long, default_value_t = 25)]
    max_iterations: u32,

    /// Retries for transient model errors
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Maximum tokens per model response (0 = provider default)
    #[arg(long, default_value_t = 0)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Run the tool calls of a round one at a time
    #[arg(long)]
    sequential_tools: bool,

    /// Print the transcript as JSON
    #[arg(long)]
    json: bool,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> AbacusConfig {
        AbacusConfig {
            prompt: self.prompt,
            model: self.model,
            base_url: self.base_url,
            api_key_env: self.api_key_env,
            max_iterations: self.max_iterations,
            retries: self.retries,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            request_timeout: Duration::from_secs(self.timeout_secs),
            sequential_tools: self.sequential_tools,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("abacus={default_level},warn")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// One line per message: `[role] content`, tool calls spelled out.
fn render_transcript(transcript: &Transcript) -> String {
    let mut out = String::new();
    for message in transcript.messages() {
        let tag = match &message.tool_call_id {
            Some(id) => format!("[{} {id}]", message.role),
            None => format!("[{}]", message.role),
        };
        if !message.text().is_empty() || !message.has_tool_calls() {
            out.push_str(&format!("{tag} {}\n", message.text()));
        }
        for call in message.tool_calls() {
            out.push_str(&format!(
                "{tag} call {} {}({})\n",
                call.id,
                call.name(),
                call.arguments()
            ));
        }
    }
    out
}

fn print_transcript(transcript: &Transcript, json: bool, to_stderr: bool) {
    let text = if json {
        match serde_json::to_string_pretty(transcript) {
            Ok(s) => s,
            Err(e) => format!("<failed to serialize transcript: {e}>"),
        }
    } else {
        render_transcript(transcript)
    };
    if to_stderr {
        eprintln!("{text}");
    } else {
        println!("{text}");
    }
}

async fn run(config: AbacusConfig, json: bool) -> Result<(), String> {
    if config.api_key().is_none() {
        tracing::warn!(
            "{} is not set; the first model call will fail",
            config.api_key_env
        );
    }

    let client = config
        .build_client()
        .map_err(|e| format!("failed to create API client: {e}"))?;
    let tools = config
        .build_tool_registry()
        .map_err(|e| format!("failed to register tools: {e}"))?;
    let harness_config = config.build_harness_config();

    let handler = LoggingHandler;
    let harness = Harness::new(&client, &tools, harness_config).with_event_handler(&handler);

    // Ctrl-C cancels the run; the transcript so far is still printed.
    let cancel = harness.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match harness.run(&config.prompt).await {
        Ok(outcome) => {
            print_transcript(&outcome.transcript, json, false);
            if !json {
                println!("Answer: {}", outcome.text());
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Run aborted ({}): {}", err.reason.kind(), err.reason);
            print_transcript(&err.transcript, json, true);
            Err(format!("agent run {} failed", err.trace_id))
        }
    }
}

#[tokio::main]
async fn main() {
    let env_file = load_env_file(None);
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Some(path) = &env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    let json = cli.json;

    if let Err(e) = run(cli.into_config(), json).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
