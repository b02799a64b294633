//! # Circuit Breaker Implementation
//!
//! Per-service fault isolation with three states: Closed (normal operation),
//! Open (failing fast) and HalfOpen (a single probe call tests recovery).
//!
//! State lives behind one mutex so the decide-then-transition step is atomic. The lock
//! is never held across the protected operation; an [`AdmissionPermit`] carries the
//! decision across the await point and releases the probe slot if the caller is
//! cancelled before an outcome is recorded.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - calls fail fast until the reset timeout elapses
    Open,
    /// Testing recovery - exactly one probe call is in flight at a time
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Errors returned from a breaker-protected call
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not executed
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran and failed
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    probe_in_flight: bool,
    total_calls: u64,
    success_count: u64,
    total_failures: u64,
    rejected_calls: u64,
    total_duration: Duration,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            last_failure_time: None,
            probe_in_flight: false,
            total_calls: 0,
            success_count: 0,
            total_failures: 0,
            rejected_calls: 0,
            total_duration: Duration::ZERO,
        }
    }

    fn record_failure_time(&mut self) {
        self.last_failure_at = Some(Instant::now());
        self.last_failure_time = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// How a finished operation is recorded against the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// Failed, but not in a way that says anything about the service's health
    Neutral,
}

/// Admission decision held across the protected operation
struct AdmissionPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl AdmissionPermit<'_> {
    fn settle(mut self, outcome: Outcome, duration: Duration) {
        self.settled = true;
        self.breaker.record_outcome(self.admission, outcome, duration);
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            let mut inner = self.breaker.inner.lock();
            inner.probe_in_flight = false;
            debug!(component = %self.breaker.name, "Probe abandoned before completion, slot released");
        }
    }
}

/// Circuit breaker protecting one downstream service
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Service name for logging and metrics
    name: String,

    /// Configuration parameters
    config: CircuitBreakerConfig,

    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_seconds = config.reset_timeout.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Execute an operation; every error counts as a failure
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Execute an operation, letting `counts_as_failure` decide which errors are
    /// recorded against the service.
    ///
    /// Errors the classifier rejects are returned unchanged without moving the breaker.
    /// A rejected probe releases its slot and leaves the circuit HalfOpen.
    pub async fn call_classified<F, Fut, T, E, C>(
        &self,
        operation: F,
        counts_as_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        let permit = match self.try_acquire() {
            Some(permit) => permit,
            None => {
                return Err(CircuitBreakerError::CircuitOpen {
                    component: self.name.clone(),
                });
            }
        };

        let start = Instant::now();
        let result = operation().await;
        let duration = start.elapsed();

        match result {
            Ok(value) => {
                permit.settle(Outcome::Success, duration);
                Ok(value)
            }
            Err(err) => {
                let outcome = if counts_as_failure(&err) {
                    Outcome::Failure
                } else {
                    Outcome::Neutral
                };
                permit.settle(outcome, duration);
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn try_acquire(&self) -> Option<AdmissionPermit<'_>> {
        let mut inner = self.inner.lock();

        let admission = match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .map(|at| at.elapsed() > self.config.reset_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!(
                        component = %self.name,
                        "Circuit breaker half-open (probing recovery)"
                    );
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(Admission::Probe)
                }
            }
        };

        match admission {
            Some(admission) => Some(AdmissionPermit {
                breaker: self,
                admission,
                settled: false,
            }),
            None => {
                inner.rejected_calls += 1;
                debug!(
                    component = %self.name,
                    state = %inner.state,
                    "Circuit breaker rejected call"
                );
                None
            }
        }
    }

    fn record_outcome(&self, admission: Admission, outcome: Outcome, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;
        inner.total_duration += duration;

        if admission == Admission::Probe {
            inner.probe_in_flight = false;
        }

        match outcome {
            Outcome::Success => {
                inner.success_count += 1;
                match (admission, inner.state) {
                    (Admission::Probe, CircuitState::HalfOpen) => {
                        inner.state = CircuitState::Closed;
                        inner.failure_count = 0;
                        info!(
                            component = %self.name,
                            duration_ms = duration.as_millis(),
                            "Circuit breaker closed (probe succeeded)"
                        );
                    }
                    (_, CircuitState::Closed) => {
                        inner.failure_count = 0;
                    }
                    _ => {}
                }
            }
            Outcome::Failure => {
                inner.total_failures += 1;
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.record_failure_time();

                match (admission, inner.state) {
                    (Admission::Probe, CircuitState::HalfOpen) => {
                        inner.state = CircuitState::Open;
                        warn!(
                            component = %self.name,
                            failure_count = inner.failure_count,
                            "Circuit breaker re-opened (probe failed)"
                        );
                    }
                    (_, CircuitState::Closed)
                        if inner.failure_count >= self.config.failure_threshold =>
                    {
                        inner.state = CircuitState::Open;
                        error!(
                            component = %self.name,
                            failure_count = inner.failure_count,
                            threshold = self.config.failure_threshold,
                            "Circuit breaker opened (failing fast)"
                        );
                    }
                    _ => {
                        debug!(
                            component = %self.name,
                            failure_count = inner.failure_count,
                            state = %inner.state,
                            "Circuit breaker recorded failure"
                        );
                    }
                }
            }
            Outcome::Neutral => {
                debug!(
                    component = %self.name,
                    "Operation error not counted against circuit breaker"
                );
            }
        }
    }

    /// Current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failures since the last reset
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Wall-clock time of the most recent recorded failure
    pub fn last_failure_time(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_failure_time
    }

    /// Service name this breaker protects
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Snapshot of breaker state and call counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        let (failure_rate, success_rate, average_duration) = if inner.total_calls > 0 {
            (
                inner.total_failures as f64 / inner.total_calls as f64,
                inner.success_count as f64 / inner.total_calls as f64,
                average_duration(inner.total_duration, inner.total_calls),
            )
        } else {
            (0.0, 0.0, Duration::ZERO)
        };

        CircuitBreakerMetrics {
            total_calls: inner.total_calls,
            success_count: inner.success_count,
            failure_count: inner.total_failures,
            rejected_calls: inner.rejected_calls,
            consecutive_failures: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            total_duration: inner.total_duration,
            current_state: inner.state,
            failure_rate,
            success_rate,
            average_duration,
        }
    }

    /// Whether this breaker is currently admitting ordinary calls
    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Force the circuit open (emergency stop)
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.failure_count = inner.failure_count.max(self.config.failure_threshold);
        inner.record_failure_time();
        warn!(component = %self.name, "Circuit breaker forced open");
    }

    /// Force the circuit closed (emergency recovery)
    pub fn force_closed(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.probe_in_flight = false;
        info!(component = %self.name, "Circuit breaker forced closed");
    }
}

fn average_duration(total: Duration, calls: u64) -> Duration {
    Duration::from_secs_f64(total.as_secs_f64() / calls as f64)
}
