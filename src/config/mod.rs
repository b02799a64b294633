//! # Orchestrator Configuration
//!
//! Typed, validated configuration for the orchestrator. Values are layered by
//! [`ConfigManager`]: built-in defaults, then `orchestrator.toml`, then an
//! environment-specific `<env>.toml`, then `ORCHESTRATOR__SECTION__KEY` variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orchestrator_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let retry = manager.config().retry.to_policy();
//! let rag = manager.config().circuit_breakers.config_for_component("rag_service");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{defaults, services, workflow};
use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub circuit_breakers: CircuitBreakersConfig,
    pub services: HashMap<String, ServiceConfig>,
    pub pipeline: PipelineConfig,
    pub state_store: StateStoreConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

impl Default for OrchestratorConfig {
    /// Defaults with the four reference services registered
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            circuit_breakers: CircuitBreakersConfig::default(),
            services: ServiceConfig::reference_services(),
            pipeline: PipelineConfig::default(),
            state_store: StateStoreConfig::default(),
            orchestration: OrchestrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Configuration suited to tests: millisecond backoff, short breaker cooldown
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.retry = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        config.circuit_breakers.default_config.reset_timeout_seconds = 1;
        config.state_store.operation_timeout_ms = 500;
        config
    }

    /// Validate all sections
    pub fn validate(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.retry.validate()?;
        self.circuit_breakers.validate()?;
        for (name, service) in &self.services {
            service.validate(name)?;
        }
        self.pipeline.validate()?;
        self.state_store.validate()?;
        self.orchestration.validate()?;
        Ok(())
    }

    pub fn request_timeout_for(&self, service_name: &str) -> Duration {
        let timeout_ms = self
            .services
            .get(service_name)
            .and_then(|s| s.timeout_ms)
            .unwrap_or(self.http.default_timeout_ms);
        Duration::from_millis(timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub default_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            health_check_timeout_ms: defaults::HEALTH_CHECK_TIMEOUT_MS,
            user_agent: format!("orchestrator-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "http.default_timeout_ms",
                self.default_timeout_ms,
                "must be greater than 0",
            ));
        }
        if self.health_check_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "http.health_check_timeout_ms",
                self.health_check_timeout_ms,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay_ms: defaults::BASE_DELAY_MS,
            max_delay_ms: defaults::MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        self.to_policy()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value("retry", format!("{self:?}"), reason))
    }
}

/// Breaker defaults plus per-service overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakersConfig {
    pub default_config: CircuitBreakerComponentConfig,

    /// Overrides keyed by service name
    pub component_configs: HashMap<String, CircuitBreakerComponentConfig>,
}

impl CircuitBreakersConfig {
    /// Get configuration for a specific component
    pub fn config_for_component(&self, component_name: &str) -> CircuitBreakerComponentConfig {
        self.component_configs
            .get(component_name)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    fn validate(&self) -> ConfigResult<()> {
        self.default_config.validate("circuit_breakers.default_config")?;
        for (name, component) in &self.component_configs {
            component.validate(&format!("circuit_breakers.component_configs.{name}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerComponentConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Seconds since the last failure before a probe is allowed
    pub reset_timeout_seconds: u64,
}

impl Default for CircuitBreakerComponentConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::FAILURE_THRESHOLD,
            reset_timeout_seconds: defaults::RESET_TIMEOUT_SECONDS,
        }
    }
}

impl CircuitBreakerComponentConfig {
    /// Convert to resilience module's format
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_seconds),
        }
    }

    fn validate(&self, field: &str) -> ConfigResult<()> {
        self.to_resilience_config()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value(field, format!("{self:?}"), reason))
    }
}

/// A downstream service reachable over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,

    /// Per-call timeout; falls back to `http.default_timeout_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: None,
        }
    }

    pub fn reference_services() -> HashMap<String, ServiceConfig> {
        services::DEFAULT_ENDPOINTS
            .iter()
            .map(|(name, url)| (name.to_string(), ServiceConfig::new(*url)))
            .collect()
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        let field = format!("services.{name}.base_url");
        if self.base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(field, "service definition"));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            ConfigurationError::invalid_value(field, &self.base_url, e.to_string())
        })?;
        if self.timeout_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                format!("services.{name}.timeout_ms"),
                0,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Adjustments to the reference pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of context passages requested from the retrieval service
    pub rag_top_k: u32,

    /// Template used when the recommender returns no recommendation
    pub default_template_id: String,

    /// Per-step overrides keyed by step name
    pub steps: HashMap<String, StepOverride>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rag_top_k: defaults::RAG_TOP_K,
            default_template_id: defaults::DEFAULT_TEMPLATE_ID.to_string(),
            steps: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.rag_top_k == 0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.rag_top_k",
                self.rag_top_k,
                "must be greater than 0",
            ));
        }
        if self.default_template_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "default_template_id",
                "pipeline",
            ));
        }
        for (name, step) in &self.steps {
            if let Some(weight) = step.progress_weight {
                if !(0.0..=1.0).contains(&weight) {
                    return Err(ConfigurationError::invalid_step_config(
                        name,
                        format!("progress_weight {weight} outside [0.0, 1.0]"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Memory,
    Redis,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    pub backend: StateBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    pub key_prefix: String,

    /// Expiry applied to workflow records; records never expire when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,

    /// Upper bound on any single state store call
    pub operation_timeout_ms: u64,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Memory,
            redis_url: None,
            key_prefix: workflow::DEFAULT_KEY_PREFIX.to_string(),
            ttl_seconds: None,
            operation_timeout_ms: defaults::STATE_OPERATION_TIMEOUT_MS,
        }
    }
}

impl StateStoreConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_seconds.map(Duration::from_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.backend == StateBackend::Redis
            && self.redis_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigurationError::missing_required_field(
                "redis_url",
                "state_store (backend = \"redis\")",
            ));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("key_prefix", "state_store"));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "state_store.operation_timeout_ms",
                0,
                "must be greater than 0",
            ));
        }
        if self.ttl_seconds == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "state_store.ttl_seconds",
                0,
                "must be greater than 0 when set",
            ));
        }
        if let Some(ttl) = self.ttl_seconds.filter(|ttl| *ttl > defaults::MAX_STATE_TTL_SECONDS) {
            return Err(ConfigurationError::invalid_value(
                "state_store.ttl_seconds",
                ttl,
                format!("must not exceed {} seconds", defaults::MAX_STATE_TTL_SECONDS),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Caller-level deadline for a whole workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_timeout_seconds: Option<u64>,
}

impl OrchestrationConfig {
    pub fn workflow_timeout(&self) -> Option<Duration> {
        self.workflow_timeout_seconds.map(Duration::from_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.workflow_timeout_seconds == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "orchestration.workflow_timeout_seconds",
                0,
                "must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit level; derived from the environment when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}
