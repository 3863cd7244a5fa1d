//! Transaction configuration and retry logic
//!
//! Contains RetryConfig for transaction retry behavior and related utilities.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Retry Configuration
// ============================================================================

/// Configuration for transaction retry behavior
///
/// Transient failures (commit conflicts, store unavailability) are retried
/// with exponential backoff. Persisted in `huebucket.toml` under `[retry]`.
///
/// # Example
/// ```ignore
/// let config = RetryConfig {
///     max_retries: 5,
///     base_delay_ms: 10,
///     max_delay_ms: 200,
///     jitter: true,
/// };
/// db.transaction_with_retry(&config, |txn| { ... })?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Sleep a uniformly random duration up to the computed delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 10,
            max_delay_ms: 200,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Enable or disable full jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound of the delay after a failed attempt: `min(base * 2^attempt, max)`
    pub fn backoff_ceiling(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow (1 << 63 is the max for u64)
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Calculate delay for a given attempt
    ///
    /// With jitter the delay is drawn uniformly from `[0, ceiling]`.
    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let micros = ceiling.as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(0..=micros))
    }
}
