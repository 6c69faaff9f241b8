//! Tool abstractions for function-calling agents.
//!
//! Every capability the model can invoke is a [`Tool`] trait implementor.
//! Tools are collected into a [`ToolRegistry`] and run in batches by the
//! [`ToolExecutor`], which validates arguments, applies timeouts and turns
//! every failure into a tool-error result the model can read.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based, deserializes typed arguments. The
//!   arithmetic tools are built this way.
//! - **`impl Tool`**: a struct with manual [`Tool::definition()`] and
//!   [`Tool::execute()`], for tools that hold state.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`], [`FnTool`], [`ToolError`].
//! - [`arithmetic`]: `add`, `multiply`, `divide`.
//! - [`executor`]: [`ToolExecutor`] and [`ToolOutcome`].
//! - [`reflection`]: error formatting for model self-correction.

pub mod arithmetic;
pub mod core;
pub mod executor;
pub mod reflection;

// Re-export commonly used items at the module level.
pub use arithmetic::ArithmeticArgs;
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, FnTool, Tool, ToolError, ToolFuture, ToolRegistry, truncate_result,
    validate_tool_arguments,
};
pub use executor::{ExecutorConfig, ToolExecutor, ToolOutcome};
