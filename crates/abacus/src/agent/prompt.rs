//! Default prompts for arithmetic runs.

/// System instruction seeded at the start of every arithmetic run.
pub const ARITHMETIC_SYSTEM_PROMPT: &str =
    "You are a helpful assistant tasked with performing arithmetic on a set of inputs. \
     Use the provided tools for every calculation and report the final result.";

/// Task used when the CLI is given no `--prompt`.
pub const DEFAULT_TASK: &str =
    "First add 3 and 4. Second, divide 10 by 2. And finally multiply both the results.";
