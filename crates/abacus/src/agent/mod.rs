//! Agent runtime: the [`Harness`] loop and its supporting types.
//!
//! - [`harness::Harness`]: the bounded tool-use loop. Start here.
//! - [`config::HarnessConfig`]: model, iteration bound, retry, tool settings.
//! - [`events`]: [`EventHandler`] trait and [`HarnessEvent`] enum for
//!   observing the loop.
//! - [`outcome`]: [`RunOutcome`], [`RunError`] and the [`AbortReason`] taxonomy.
//! - [`prompt`]: default system prompt and task.

pub mod config;
pub mod events;
mod execution;
pub mod harness;
pub mod outcome;
pub mod prompt;

// Re-export commonly used items at the module level.
pub use config::HarnessConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, HarnessEvent, LoggingHandler, NoopHandler,
};
pub use harness::{Harness, Route, route};
pub use outcome::{AbortReason, LoopState, RunError, RunOutcome};
pub use prompt::{ARITHMETIC_SYSTEM_PROMPT, DEFAULT_TASK};
