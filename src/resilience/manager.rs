//! # Circuit Breaker Manager
//!
//! Registry of circuit breakers keyed by service name. Breakers are created lazily on
//! first use and shared by every workflow running in the process.

use crate::config::CircuitBreakersConfig;
use crate::resilience::{CircuitBreaker, SystemCircuitBreakerMetrics};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Manager for the per-service circuit breakers
#[derive(Debug)]
pub struct CircuitBreakerManager {
    /// Circuit breakers by service name
    circuit_breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,

    config: CircuitBreakersConfig,
}

impl CircuitBreakerManager {
    pub fn from_config(config: &CircuitBreakersConfig) -> Self {
        info!(
            default_failure_threshold = config.default_config.failure_threshold,
            component_overrides = config.component_configs.len(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: Arc::new(RwLock::new(HashMap::new())),
            config: config.clone(),
        }
    }

    /// Get or create the circuit breaker for a service
    pub async fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.circuit_breakers.read().await;
            if let Some(breaker) = breakers.get(component_name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.circuit_breakers.write().await;

        // Double-check: another task may have created it between the locks
        if let Some(breaker) = breakers.get(component_name) {
            return Arc::clone(breaker);
        }

        let component_config = self
            .config
            .config_for_component(component_name)
            .to_resilience_config();

        let breaker = Arc::new(CircuitBreaker::new(
            component_name.to_string(),
            component_config,
        ));

        breakers.insert(component_name.to_string(), Arc::clone(&breaker));

        info!(
            component = component_name,
            total_circuit_breakers = breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Snapshot of every breaker created so far
    pub async fn get_system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system_metrics = SystemCircuitBreakerMetrics::new();

        let breakers = self.circuit_breakers.read().await;
        for (name, breaker) in breakers.iter() {
            system_metrics.add_circuit_breaker(name.clone(), breaker.metrics());
        }

        system_metrics
    }

    /// Trip one service's breaker; calls fail fast until its reset timeout elapses
    pub async fn force_open(&self, component_name: &str) {
        warn!(component = component_name, "Forcing circuit breaker open");
        self.get_circuit_breaker(component_name).await.force_open();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerComponentConfig;
    use crate::resilience::CircuitState;
    use std::time::Duration;

    fn manager_with_override() -> CircuitBreakerManager {
        let mut config = CircuitBreakersConfig::default();
        config.component_configs.insert(
            "rag_service".to_string(),
            CircuitBreakerComponentConfig {
                failure_threshold: 2,
                reset_timeout_seconds: 10,
            },
        );
        CircuitBreakerManager::from_config(&config)
    }

    #[tokio::test]
    async fn test_lazy_creation_and_sharing() {
        let manager = manager_with_override();
        assert!(manager.get_system_metrics().await.circuit_breakers.is_empty());

        let first = manager.get_circuit_breaker("content_generator").await;
        let second = manager.get_circuit_breaker("content_generator").await;
        assert!(Arc::ptr_eq(&first, &second));

        let metrics = manager.get_system_metrics().await;
        assert_eq!(metrics.circuit_breakers.len(), 1);
        assert!(metrics.circuit_breakers.contains_key("content_generator"));
    }

    #[tokio::test]
    async fn test_component_specific_configuration() {
        let manager = manager_with_override();

        let rag = manager.get_circuit_breaker("rag_service").await;
        assert_eq!(rag.config().failure_threshold, 2);
        assert_eq!(rag.config().reset_timeout, Duration::from_secs(10));

        let other = manager.get_circuit_breaker("design_rules").await;
        assert_eq!(other.config().failure_threshold, 5);
        assert_eq!(other.config().reset_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_force_open_single_component() {
        let manager = manager_with_override();
        manager.get_circuit_breaker("design_rules").await;

        manager.force_open("rag_service").await;

        let metrics = manager.get_system_metrics().await;
        assert_eq!(metrics.open_circuits(), vec!["rag_service".to_string()]);
        assert!(!metrics.all_healthy());
        assert_eq!(
            metrics.circuit_breakers["design_rules"].current_state,
            CircuitState::Closed
        );
    }
}
