//! Downstream service health classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of probing a service's root endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceHealth {
    /// Answered with 200
    Healthy,
    /// Answered with any other status
    Degraded { status_code: u16 },
    /// Did not answer
    Unhealthy { error: String },
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded { status_code } => write!(f, "degraded (HTTP {status_code})"),
            Self::Unhealthy { error } => write!(f, "unhealthy: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_with_status_tag() {
        assert_eq!(
            serde_json::to_value(ServiceHealth::Degraded { status_code: 503 }).unwrap(),
            json!({"status": "degraded", "status_code": 503})
        );
        assert_eq!(
            serde_json::to_value(ServiceHealth::Healthy).unwrap(),
            json!({"status": "healthy"})
        );
        assert!(!ServiceHealth::Unhealthy { error: "refused".into() }.is_healthy());
    }
}
