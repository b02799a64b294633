//! # Orchestrator Errors
//!
//! Error taxonomy shared by the invoker, the state store and the coordinator.

use crate::resilience::CircuitBreakerError;
use crate::services::ServiceCallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The service's breaker rejected the call without contacting it
    #[error("Circuit breaker is open for {service}")]
    CircuitOpen { service: String },

    /// The service was contacted (possibly several times) and failed
    #[error("Service {service} error: {source}")]
    Service {
        service: String,
        #[source]
        source: ServiceCallError,
    },

    /// Misconfiguration of the orchestrator itself; never retried and never
    /// counted against a breaker
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn service(source: ServiceCallError) -> Self {
        Self::Service {
            service: source.service().to_string(),
            source,
        }
    }

    /// Only service failures say anything about a service's health
    pub fn counts_as_service_failure(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether an optional step may degrade to its fallback on this error
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Service { .. } | Self::CircuitOpen { .. })
    }

    /// Flatten a breaker-wrapped result back into the taxonomy
    pub fn from_breaker(err: CircuitBreakerError<OrchestratorError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen { component } => Self::CircuitOpen { service: component },
            CircuitBreakerError::OperationFailed(inner) => inner,
        }
    }
}

impl From<ServiceCallError> for OrchestratorError {
    fn from(source: ServiceCallError) -> Self {
        Self::service(source)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
