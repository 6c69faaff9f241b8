//! Correlation IDs for agent runs.
//!
//! Assigns a unique `trace_id` to each harness run and a `span_id` to each
//! iteration within it, so log lines from concurrent runs can be told apart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for an agent run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same clock tick.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for an iteration within a run.
pub fn generate_span_id(trace_id: &str, iteration: u32) -> String {
    format!("{trace_id}:i{iteration}")
}

/// Generate a call ID for a tool call the model left unidentified.
pub fn generate_call_id(trace_id: &str, iteration: u32, index: usize) -> String {
    format!("call-{}-{index}", generate_span_id(trace_id, iteration))
}
