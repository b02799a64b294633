//! # Circuit Breaker Metrics
//!
//! Point-in-time snapshots of breaker behavior, used by health reporting and the
//! registry's system-wide view.

use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Total number of operations that were admitted and executed
    pub total_calls: u64,

    /// Number of successful calls
    pub success_count: u64,

    /// Number of calls recorded as failures
    pub failure_count: u64,

    /// Calls rejected without running because the circuit was open
    pub rejected_calls: u64,

    /// Consecutive failures since the last reset
    pub consecutive_failures: u32,

    /// Wall-clock time of the most recent recorded failure
    pub last_failure_time: Option<DateTime<Utc>>,

    /// Total duration of all executed operations
    pub total_duration: Duration,

    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,

    /// Calculated success rate (0.0 to 1.0)
    pub success_rate: f64,

    /// Average operation duration
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    /// Create new metrics instance with zero values
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_calls: 0,
            consecutive_failures: 0,
            last_failure_time: None,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
            success_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }

    /// Check if metrics indicate healthy operation
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Probing service health",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Failures: {} | Rejected: {} | Avg Duration: {}ms",
            self.state_description(),
            self.total_calls,
            self.success_rate * 100.0,
            self.failure_count,
            self.rejected_calls,
            self.average_duration.as_millis()
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// System-wide circuit breaker metrics aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    /// Metrics for individual circuit breakers by service name
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,

    /// Timestamp of collection
    pub collected_at: DateTime<Utc>,
}

impl SystemCircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            circuit_breakers: HashMap::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn add_circuit_breaker(&mut self, name: String, metrics: CircuitBreakerMetrics) {
        self.circuit_breakers.insert(name, metrics);
    }

    /// Names of services whose circuit is currently open, sorted
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .circuit_breakers
            .iter()
            .filter(|(_, m)| m.current_state == CircuitState::Open)
            .map(|(name, _)| name.clone())
            .collect();
        open.sort();
        open
    }

    /// True when no breaker is open
    pub fn all_healthy(&self) -> bool {
        self.circuit_breakers
            .values()
            .all(|m| m.current_state != CircuitState::Open)
    }
}

impl Default for SystemCircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_health_by_state() {
        let mut metrics = CircuitBreakerMetrics::new();
        assert!(metrics.is_healthy());

        metrics.current_state = CircuitState::Open;
        assert!(!metrics.is_healthy());
        assert_eq!(metrics.state_description(), "Failing - Rejecting all calls");

        metrics.current_state = CircuitState::Closed;
        metrics.failure_rate = 0.5;
        assert!(!metrics.is_healthy());
    }

    #[test]
    fn test_system_metrics_open_circuits() {
        let mut system = SystemCircuitBreakerMetrics::new();
        let open = CircuitBreakerMetrics {
            current_state: CircuitState::Open,
            ..Default::default()
        };
        system.add_circuit_breaker("rag_service".to_string(), open.clone());
        system.add_circuit_breaker("design_rules".to_string(), open);
        system.add_circuit_breaker(
            "content_generator".to_string(),
            CircuitBreakerMetrics::new(),
        );

        assert_eq!(
            system.open_circuits(),
            vec!["design_rules".to_string(), "rag_service".to_string()]
        );
        assert!(!system.all_healthy());
    }
}
