//! Bounded exponential-backoff retry for fallible async operations.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep base_delay
//! attempt 2 ──fail──▶ sleep base_delay × backoff
//! attempt 3 ──fail──▶ RetriesExhausted { attempts: 3, last_error }
//! ```
//!
//! Only [retryable](crate::error::LensError::is_retryable) errors are
//! retried; configuration, decoding and liquidity errors return immediately.
//!
//! ## Example
//!
//! ```no_run
//! use chain_lens::retry::RetryPolicy;
//! use chain_lens::rpc::{AlloyRpcClient, RpcClient};
//! use chain_lens::error::LensResult;
//!
//! # async fn example(client: AlloyRpcClient) -> LensResult<()> {
//! let policy = RetryPolicy::default();
//! let block = policy.run("eth_blockNumber", || client.latest_block_number()).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{LensError, LensResult};

/// Retry policy: attempt budget plus delay schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff: f64,
    jitter: f64,
}

impl Default for RetryPolicy {
    /// Three attempts, 1 second base delay, doubling, no jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff: 2.0,
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one and
    /// `backoff` to at least `1.0`.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: backoff.max(1.0),
            jitter: 0.0,
        }
    }

    /// Randomize each delay by `±fraction / 2` (e.g. `0.25` gives ±12.5%).
    #[must_use]
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Attempt budget, including the first attempt.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failure.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Nominal delay after failed attempt `attempt` (1-based), before jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        self.base_delay.mul_f64(self.backoff.powi(exponent))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = self.jitter.mul_add(rand::random::<f64>() - 0.5, 1.0);
        delay.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error or the
    /// attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged when it is not retryable, or
    /// [`LensError::RetriesExhausted`] wrapping the final error otherwise.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> LensResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LensResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "Retry budget exhausted"
                        );
                        return Err(LensError::retries_exhausted(attempt, operation, e));
                    }

                    let delay = self.jittered(self.delay_for(attempt));
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed. Retrying in {:?}...",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
