use std::time::Duration;

/// Tunables for order placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Upper bound on one placement, retries included. On expiry the
    /// in-flight unit of work is dropped and therefore rolled back.
    pub placement_timeout: Duration,
    /// Attempts per placement; only retryable persistence failures are retried.
    pub max_attempts: u32,
}

impl CheckoutConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

    pub fn new(placement_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            placement_timeout,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT, 1)
    }
}
