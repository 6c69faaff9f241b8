//! Structured reflection on tool failures.
//!
//! When a tool call fails, the result message the model receives is built
//! here: the error kind, its cause, recovery hints, and the arguments that
//! were used. The model can then correct itself on the next turn.

use super::core::ToolError;

/// Maximum characters of the original arguments echoed back.
const ARGS_PREVIEW_CHARS: usize = 200;

/// Format a tool failure as the content of a tool result message.
///
/// The text always starts with `Error:` so it reads as a tool error.
pub fn format_tool_failure(error: &ToolError, arguments: &str) -> String {
    let mut msg = format!("Error: {error} [{}]\n", error.kind());

    let suggestions = recovery_hints(error);
    if !suggestions.is_empty() {
        msg.push_str("\nPossible causes and recovery:\n");
        for suggestion in &suggestions {
            msg.push_str(&format!("  - {suggestion}\n"));
        }
    }

    let args_preview: String = arguments.chars().take(ARGS_PREVIEW_CHARS).collect();
    msg.push_str(&format!("\nArguments used: {args_preview}"));
    if arguments.chars().count() > ARGS_PREVIEW_CHARS {
        msg.push_str("...");
    }

    msg
}

fn recovery_hints(error: &ToolError) -> Vec<String> {
    match error {
        ToolError::UnknownTool { available, .. } => {
            let mut hints = vec!["Call only tools from the catalog.".to_string()];
            if !available.is_empty() {
                hints.push(format!("Available tools: {}", available.join(", ")));
            }
            hints
        }
        ToolError::ArgumentValidation { detail, .. } => {
            let mut hints =
                vec!["Check that the arguments are valid JSON with correct field names and types.".to_string()];
            if detail.contains("required property") {
                hints.push("Supply every required argument listed in the tool's schema.".into());
            }
            if detail.contains("is not of type") {
                hints.push("Pass each argument with the type the tool's schema declares.".into());
            }
            hints
        }
        ToolError::Execution { detail, .. } => {
            let lower = detail.to_lowercase();
            let mut hints = Vec::new();
            if lower.contains("division by zero") {
                hints.push("The divisor is zero. Division by zero is undefined; do not retry the same call.".into());
            }
            if lower.contains("finite") || lower.contains("representable") {
                hints.push(
                    "The result overflowed. Use smaller operands or report that the value is out of range."
                        .into(),
                );
            }
            if lower.contains("timed out") || lower.contains("timeout") {
                hints.push("The tool took too long. Try again with different arguments.".into());
            }
            if hints.is_empty() {
                hints.push("Review the error message and adjust your approach.".into());
            }
            hints
        }
        ToolError::DuplicateTool(_) => Vec::new(),
    }
}
