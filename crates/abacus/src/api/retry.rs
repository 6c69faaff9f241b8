//! Automatic retry with exponential backoff and jitter.
//!
//! Classifies provider failures as transient (HTTP 408/429/5xx, network
//! timeouts, overload messages) or permanent. Only transient failures are
//! retried; authentication and request-shape errors never are.

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 = fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// No retries at all.
    pub fn disabled() -> Self {
        Self::with_retries(0)
    }

    /// Retries without any delay between attempts. Handy for tests.
    pub fn immediate(retries: u32) -> Self {
        Self {
            max_retries: retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        // NaN and negative values collapse to zero; `min` keeps the cap.
        let capped = base.max(0.0).min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number; no rand needed.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::try_from_secs_f64(capped * jitter_factor).unwrap_or(self.max_delay)
        } else {
            Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
        }
    }
}

/// Whether an HTTP status code indicates a transient (retryable) failure.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..=599).contains(&status)
}

/// Whether a provider error message indicates a transient failure.
pub fn is_transient_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    [
        "rate limit",
        "overloaded",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "temporarily unavailable",
        "try again",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether a provider error message indicates a permanent failure.
pub fn is_permanent_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    [
        "invalid api key",
        "incorrect api key",
        "unauthorized",
        "insufficient_quota",
        "exceeded your current quota",
        "invalid_request",
        "model_not_found",
    ]
    .iter()
    .any(|p| lower.contains(p))
}
