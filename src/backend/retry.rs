use std::time::Duration;

use crate::Error;

/// Retry count used when the call leaves `max_retries` unset.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Backend-side retry policy driven by the forwarded `max_retries`.
///
/// Deterministic exponential backoff: `min_delay * 2^attempt`, capped at `max_delay`,
/// with a server-provided `Retry-After` taking precedence (still capped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: Option<u32>) -> Self {
        Self {
            max_retries: max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay.max(min_delay);
        self
    }

    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn should_retry(&self, err: &Error, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_retryable()
    }

    pub fn delay(&self, attempt: u32, retry_after_ms: Option<u32>) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let base = self.min_delay.saturating_mul(factor);
        let chosen = retry_after_ms
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(base);
        chosen.min(self.max_delay)
    }
}
