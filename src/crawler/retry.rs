//! Retry policy for transient fetch failures

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive jitter
///
/// The delay before attempt `n + 1` (after `n` failed attempts) is
/// `min(base * 2^(n-1), max) + U(0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, config: &RetryConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Returns true if another attempt is allowed after `attempt` attempts
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff without jitter after `attempt` failed attempts
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        // 2^62 ms already saturates; cap to keep the shift in range
        let exponent = attempt.saturating_sub(1).min(62);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Backoff including a uniformly random jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_backoff(attempt) + Duration::from_millis(jitter)
    }
}
