//! Tool abstraction and registry.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! API definition (name, description, JSON Schema) and an async `execute`
//! method over already-validated JSON arguments. Tools are collected into a
//! [`ToolRegistry`], which rejects duplicate names and exports the catalog
//! sent to the model.

use crate::ToolDef;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::debug;

/// Maximum size (in bytes) for a serialized tool result before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::execute`].
///
/// `Ok` carries the single JSON output value; `Err` carries the cause of an
/// execution fault, which the executor reports back to the model.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>>;

// ── Errors ─────────────────────────────────────────────────────────

/// Tool registration and dispatch errors.
///
/// Only [`ToolError::DuplicateTool`] is a construction error. The other
/// variants are recovered inside a run: they become tool-error results the
/// model can read and correct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String, available: Vec<String> },

    #[error("invalid arguments for tool '{name}': {detail}")]
    ArgumentValidation { name: String, detail: String },

    #[error("tool '{name}' failed: {detail}")]
    Execution { name: String, detail: String },
}

impl ToolError {
    /// Short machine-readable label for logs and tool-error results.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::DuplicateTool(_) => "duplicate_tool",
            ToolError::UnknownTool { .. } => "unknown_tool",
            ToolError::ArgumentValidation { .. } => "invalid_arguments",
            ToolError::Execution { .. } => "execution_failed",
        }
    }

    /// Whether this is a fault raised while running the tool itself.
    pub fn is_execution_fault(&self) -> bool {
        matches!(self, ToolError::Execution { .. })
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool that the model can invoke via function calling.
///
/// # Example
///
/// ```ignore
/// struct Negate;
///
/// impl Tool for Negate {
///     fn definition(&self) -> ToolDef {
///         ToolDef::new("negate", "Negate a number", json_schema_for::<NegateArgs>())
///     }
///
///     fn execute(&self, arguments: Value) -> ToolFuture<'_> {
///         Box::pin(async move {
///             let x = arguments["x"].as_f64().ok_or("x must be a number")?;
///             Ok(serde_json::json!(-x))
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition sent to the model.
    fn definition(&self) -> ToolDef;

    /// Run the tool on arguments that already passed schema validation.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, arguments: Value) -> ToolFuture<'_>;

    /// The tool's name (delegates to the definition).
    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// Named tools available to a run.
///
/// Built once before the run starts and shared by reference afterwards;
/// nothing mutates it while a run is in flight.
///
/// # Example
///
/// ```ignore
/// let tools = ToolRegistry::new()
///     .with_arithmetic_tools()?
///     .with(Negate)?;
/// let catalog = tools.describe_all();
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, failing if its name is taken.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        let name = tool.name();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        debug!("Registered tool '{name}'");
        self.tools.insert(name, Box::new(tool));
        Ok(())
    }

    /// Register a tool, replacing any tool with the same name. Meant for
    /// swapping in test doubles.
    pub fn replace(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Catalog of every tool definition, sorted by name.
    pub fn describe_all(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync>;

/// A closure-based tool that deserializes its arguments into a typed struct.
///
/// The generic constructor performs type erasure so `FnTool` is a concrete,
/// dyn-compatible type. Use it for stateless tools; tools that hold state
/// should implement [`Tool`] directly.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct NegateArgs {
///     /// The number to negate.
///     x: f64,
/// }
///
/// let tool = FnTool::new(
///     ToolDef::new("negate", "Negate a number", json_schema_for::<NegateArgs>()),
///     |args: NegateArgs| async move { Ok(serde_json::json!(-args.x)) },
/// );
/// ```
pub struct FnTool {
    def: ToolDef,
    handler: ErasedToolHandler,
}

impl FnTool {
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let erased = move |raw: Value| -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> {
            match serde_json::from_value::<A>(raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { Err(format!("could not decode arguments: {e}")) }),
            }
        };

        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: Value) -> ToolFuture<'_> {
        (self.handler)(arguments)
    }

    fn name(&self) -> String {
        self.def.function.name.clone()
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Parse raw JSON argument text and validate it against a tool's schema.
///
/// Returns the parsed arguments, or a description of every problem found.
pub fn validate_tool_arguments(def: &ToolDef, arguments: &str) -> Result<Value, String> {
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    let args: Value =
        serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {e}"))?;

    // An invalid schema is a bug in the tool definition, not in the call.
    let validator = match jsonschema::validator_for(&def.function.parameters) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping validation for '{}': bad schema: {e}", def.name());
            return Ok(args);
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(&args)
        .map(|e| {
            let path = e.instance_path().to_string();
            if path.is_empty() {
                format!("{e}")
            } else {
                format!("{path}: {e}")
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(args)
    } else {
        Err(errors.join("; "))
    }
}

/// Truncate a string to at most `max` bytes, appending a notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..end).unwrap_or_default(),
        s.len()
    )
}

// ── Tests ──────────────────────────────────────────────────────────
