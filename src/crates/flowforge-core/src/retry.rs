//! Per-node retry policy and backoff (§4.6, §6.6).

use std::time::Duration;

/// Exponential backoff with optional jitter, applied to `Transient`
/// [`crate::error::FlowError`] failures only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Upper bound on the delay between attempts.
    pub max_delay_ms: u64,
    /// Whether to add up to 25% random jitter to each computed delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from a node's `config.retries`/`config.retry_delay_ms`
    /// overrides, falling back to `default` for anything unset.
    pub fn from_node_config(
        retries: Option<u32>,
        retry_delay_ms: Option<u64>,
        default: RetryPolicy,
    ) -> Self {
        Self {
            max_attempts: retries.map(|r| r + 1).unwrap_or(default.max_attempts),
            initial_delay_ms: retry_delay_ms.unwrap_or(default.initial_delay_ms),
            ..default
        }
    }

    /// Delay before retry attempt number `attempt` (1-indexed: the delay
    /// before the *second* overall attempt is `attempt == 1`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64;
        let scaled = base * self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let capped = scaled.min(self.max_delay_ms as f64);
        let final_ms = if self.jitter {
            let jitter_factor = rand::random::<f64>() * 0.25;
            capped * (1.0 + jitter_factor)
        } else {
            capped
        };
        Duration::from_millis(final_ms.round() as u64)
    }
}
