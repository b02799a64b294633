//! # Resilience Module
//!
//! Fault tolerance for calls into downstream task services: one circuit breaker per
//! service name plus bounded exponential retry with jitter.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Fast-fail a service that keeps failing, probe it again after a cooldown
//! - **Breaker Registry**: Lazily creates and shares one breaker per service across workflows
//! - **Retry Executor**: Re-invokes retryable failures with capped, jittered exponential backoff
//! - **Metrics**: Point-in-time snapshots of breaker state for health reporting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orchestrator_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     reset_timeout: Duration::from_secs(60),
//! };
//!
//! let circuit_breaker = CircuitBreaker::new("rag_service".to_string(), config);
//!
//! let result = circuit_breaker
//!     .call(|| async { Ok::<&str, std::io::Error>("success") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
pub use retry::{
    backoff_delay, FixedJitter, JitterSource, RetryExecutor, RetryPolicy, Retryable,
    ThreadRngJitter,
};
