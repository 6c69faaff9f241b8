//! The three built-in arithmetic tools: `add`, `multiply`, `divide`.
//!
//! Each takes `{ "a": number, "b": number }` and returns one JSON number.
//! Integral results are emitted as JSON integers (`35`, not `35.0`) so the
//! model sees the same text a human would write. Division by zero and any
//! non-finite result are arithmetic faults, since JSON cannot carry them.

use super::core::{FnTool, ToolError, ToolRegistry};
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// Arguments shared by every arithmetic tool.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
pub struct ArithmeticArgs {
    /// The first operand.
    pub a: f64,
    /// The second operand.
    pub b: f64,
}

pub fn add(a: f64, b: f64) -> Result<Value, String> {
    number_value(a + b)
}

pub fn multiply(a: f64, b: f64) -> Result<Value, String> {
    number_value(a * b)
}

pub fn divide(a: f64, b: f64) -> Result<Value, String> {
    if b == 0.0 {
        return Err("division by zero".into());
    }
    number_value(a / b)
}

/// Convert a result to JSON, preferring an integer when it is exact.
pub fn number_value(x: f64) -> Result<Value, String> {
    if !x.is_finite() {
        return Err(format!("result is not a finite number ({x})"));
    }
    // 2^53: beyond this f64 no longer represents every integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if x.fract() == 0.0 && x.abs() <= MAX_EXACT {
        return Ok(Value::from(x as i64));
    }
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .ok_or_else(|| format!("result is not representable as JSON ({x})"))
}

fn arithmetic_tool(
    name: &str,
    description: &str,
    op: fn(f64, f64) -> Result<Value, String>,
) -> FnTool {
    FnTool::new(
        ToolDef::new(name, description, json_schema_for::<ArithmeticArgs>()),
        move |args: ArithmeticArgs| async move { op(args.a, args.b) },
    )
}

pub fn add_tool() -> FnTool {
    arithmetic_tool("add", "Add two numbers and return a + b.", add)
}

pub fn multiply_tool() -> FnTool {
    arithmetic_tool("multiply", "Multiply two numbers and return a * b.", multiply)
}

pub fn divide_tool() -> FnTool {
    arithmetic_tool(
        "divide",
        "Divide a by b and return a / b. b must not be zero.",
        divide,
    )
}

impl ToolRegistry {
    /// Register `add`, `multiply` and `divide`.
    pub fn with_arithmetic_tools(self) -> Result<Self, ToolError> {
        self.with(add_tool())?.with(multiply_tool())?.with(divide_tool())
    }
}
