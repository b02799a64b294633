//! # Retry Executor
//!
//! Re-invokes a failing async operation with capped exponential backoff and jitter.
//!
//! The delay before retry `r` (1-based) is
//! `min(base_delay * 2^(r-1) * (0.5 + u), max_delay)` with `u` drawn from a
//! [`JitterSource`] in `[0, 1)`. Only errors that report themselves as
//! [`Retryable`] are retried; anything else is returned on the first occurrence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Classification used by [`RetryExecutor`] to decide whether to try again
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Source of the uniform jitter factor `u` in `[0, 1)`
pub trait JitterSource: Send + Sync + fmt::Debug {
    fn sample(&self) -> f64;
}

/// Jitter from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        use rand::Rng;
        rand::thread_rng().gen::<f64>()
    }
}

/// Constant jitter, for deterministic delays in tests and benchmarks
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Retry bounds for one call site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay.is_zero() {
            return Err("base_delay must be greater than 0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("max_delay must be at least base_delay".to_string());
        }
        Ok(())
    }
}

/// Delay before the `retry_number`-th retry (1-based) for a given jitter factor.
///
/// The jitter factor is clamped to `[0, 1]`; the result never exceeds `policy.max_delay`.
pub fn backoff_delay(policy: &RetryPolicy, retry_number: u32, jitter: f64) -> Duration {
    let exponent = retry_number.saturating_sub(1).min(1000) as i32;
    let factor = 0.5 + jitter.clamp(0.0, 1.0);
    let raw = policy.base_delay.as_secs_f64() * 2f64.powi(exponent) * factor;
    let capped = raw.min(policy.max_delay.as_secs_f64()).max(0.0);
    Duration::from_secs_f64(capped).min(policy.max_delay)
}

/// Executes operations under a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_jitter(policy, Arc::new(ThreadRngJitter))
    }

    pub fn with_jitter(policy: RetryPolicy, jitter: Arc<dyn JitterSource>) -> Self {
        Self { policy, jitter }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delay before the given retry, sampling a fresh jitter factor
    pub fn delay_for(&self, retry_number: u32) -> Duration {
        backoff_delay(&self.policy, retry_number, self.jitter.sample())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last error is returned unchanged.
    pub async fn retry_with_backoff<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut retries: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    debug!(error = %err, "Non-retryable error, giving up");
                    return Err(err);
                }
                Err(err) => {
                    if retries >= self.policy.max_retries {
                        warn!(
                            attempts = retries + 1,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    let delay = self.delay_for(retries);
                    warn!(
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
