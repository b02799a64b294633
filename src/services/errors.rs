//! # Service Call Errors
//!
//! Failures from a single downstream service invocation, classified for the retry
//! executor and the circuit breaker.

use crate::resilience::Retryable;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServiceCallError {
    #[error("HTTP {status} from {service}: {body}")]
    HttpStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Request to {service} timed out after {}ms", timeout.as_millis())]
    Timeout { service: String, timeout: Duration },

    #[error("Connection to {service} failed: {reason}")]
    Connection { service: String, reason: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

impl ServiceCallError {
    pub fn http_status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            service: service.into(),
            status,
            body: body.into(),
        }
    }

    pub fn connection(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Service that produced the error
    pub fn service(&self) -> &str {
        match self {
            Self::HttpStatus { service, .. }
            | Self::Timeout { service, .. }
            | Self::Connection { service, .. }
            | Self::InvalidResponse { service, .. } => service,
        }
    }

    /// HTTP status, when the service answered with one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for ServiceCallError {
    /// Every HTTP error status, timeout and transport failure is retried.
    /// A 2xx body that is not JSON will not improve on a second attempt.
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidResponse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_names_service_and_code() {
        let err = ServiceCallError::http_status("content_generator", 500, "upstream exploded");
        let message = err.to_string();
        assert!(message.contains("content_generator"));
        assert!(message.contains("500"));
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.service(), "content_generator");
    }

    #[test]
    fn test_retry_classification() {
        assert!(ServiceCallError::http_status("s", 404, "").is_retryable());
        assert!(ServiceCallError::connection("s", "refused").is_retryable());
        assert!(ServiceCallError::Timeout {
            service: "s".to_string(),
            timeout: Duration::from_secs(30),
        }
        .is_retryable());
        assert!(!ServiceCallError::invalid_response("s", "not json").is_retryable());
    }
}
