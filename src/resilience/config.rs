//! # Circuit Breaker Configuration
//!
//! Per-breaker thresholds. System-wide defaults and per-service overrides are loaded
//! through [`crate::config::CircuitBreakersConfig`], which resolves into this type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time since the last failure after which an open circuit admits a probe
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Configuration for remote task services (template scoring, generation, ...)
    pub fn for_downstream_service() -> Self {
        Self::default()
    }

    /// Configuration for the workflow state backend
    pub fn for_state_store() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.reset_timeout > Duration::from_secs(3600) {
            return Err("reset_timeout should not exceed 3600 seconds".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_config_validation() {
        let valid_config = CircuitBreakerConfig::default();
        assert!(valid_config.validate().is_ok());

        let mut invalid_config = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(invalid_config.validate().is_err());

        invalid_config = CircuitBreakerConfig {
            reset_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_preset_configurations() {
        let service_config = CircuitBreakerConfig::for_downstream_service();
        assert_eq!(service_config.failure_threshold, 5);
        assert_eq!(service_config.reset_timeout, Duration::from_secs(60));

        let store_config = CircuitBreakerConfig::for_state_store();
        assert_eq!(store_config.failure_threshold, 3);
        assert!(store_config.validate().is_ok());
    }
}
