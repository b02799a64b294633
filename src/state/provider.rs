//! State provider with integrated circuit breaker
//!
//! Enum dispatch over the configured key-value backend. Distributed backends are
//! wrapped in a circuit breaker so an unreachable Redis costs one fast failure per
//! call instead of a full operation timeout.

use super::errors::{StoreError, StoreResult};
use super::providers::{InMemoryKeyValueStore, NoOpKeyValueStore};
use super::traits::KeyValueStore;
use crate::config::{StateBackend, StateStoreConfig};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "state-redis")]
use super::providers::RedisKeyValueStore;

#[derive(Debug, Clone)]
enum Backend {
    Memory(InMemoryKeyValueStore),

    #[cfg(feature = "state-redis")]
    Redis(Box<RedisKeyValueStore>),

    NoOp(NoOpKeyValueStore),
}

impl Backend {
    fn provider_name(&self) -> &'static str {
        match self {
            Self::Memory(s) => s.provider_name(),
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match self {
            Self::Memory(s) => s.is_distributed(),
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.is_distributed(),
            Self::NoOp(s) => s.is_distributed(),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Self::Memory(s) => s.get(key).await,
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.set(key, value, ttl).await,
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.delete(key).await,
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        match self {
            Self::Memory(s) => s.health_check().await,
            #[cfg(feature = "state-redis")]
            Self::Redis(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }
}

/// Key-value provider selected from configuration
///
/// - **memory**: in-process `DashMap`, the default
/// - **redis**: shared across instances (feature `state-redis`), breaker-protected
/// - **none**: persistence disabled
#[derive(Clone)]
pub struct StateProvider {
    backend: Backend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl std::fmt::Debug for StateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProvider")
            .field("backend", &self.backend.provider_name())
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .finish()
    }
}

impl StateProvider {
    /// Create a provider from configuration, degrading to no-op if the backend
    /// cannot be reached. Startup never fails because of the state store.
    pub async fn from_config_graceful(config: &StateStoreConfig) -> Self {
        let backend = match config.backend {
            StateBackend::Memory => {
                info!(backend = "memory", "Workflow state provider initialized");
                Backend::Memory(InMemoryKeyValueStore::new())
            }
            StateBackend::Redis => Self::create_redis_backend(config).await,
            StateBackend::None => {
                info!("Workflow state persistence disabled by configuration");
                Backend::NoOp(NoOpKeyValueStore::new())
            }
        };

        let circuit_breaker = backend.is_distributed().then(|| {
            Arc::new(CircuitBreaker::new(
                "state_store".to_string(),
                CircuitBreakerConfig::for_state_store(),
            ))
        });

        Self {
            backend,
            circuit_breaker,
        }
    }

    #[cfg(feature = "state-redis")]
    async fn create_redis_backend(config: &StateStoreConfig) -> Backend {
        let Some(url) = config.redis_url.as_deref() else {
            warn!("Redis state backend selected without redis_url, falling back to NoOp");
            return Backend::NoOp(NoOpKeyValueStore::new());
        };

        match RedisKeyValueStore::connect(url).await {
            Ok(store) => {
                info!(backend = "redis", "Workflow state provider initialized");
                Backend::Redis(Box::new(store))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp state store (graceful degradation)"
                );
                Backend::NoOp(NoOpKeyValueStore::new())
            }
        }
    }

    #[cfg(not(feature = "state-redis"))]
    async fn create_redis_backend(_config: &StateStoreConfig) -> Backend {
        warn!("Redis state backend requested but 'state-redis' feature not enabled, using NoOp");
        Backend::NoOp(NoOpKeyValueStore::new())
    }

    async fn guarded<T, F, Fut>(&self, operation: F) -> StoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        match &self.circuit_breaker {
            None => operation().await,
            Some(cb) => cb.call(operation).await.map_err(|e| match e {
                CircuitBreakerError::CircuitOpen { component } => {
                    StoreError::Unavailable(format!("circuit open for {component}"))
                }
                CircuitBreakerError::OperationFailed(inner) => inner,
            }),
        }
    }
}

impl KeyValueStore for StateProvider {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.guarded(|| self.backend.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.guarded(|| self.backend.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.guarded(|| self.backend.delete(key)).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.backend.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let provider = StateProvider::from_config_graceful(&StateStoreConfig::default()).await;
        assert_eq!(provider.provider_name(), "memory");
        assert!(!provider.is_distributed());
        assert!(provider.circuit_breaker.is_none());

        provider.set("k", "v", None).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_disabled_backend_is_noop() {
        let config = StateStoreConfig {
            backend: StateBackend::None,
            ..Default::default()
        };
        let provider = StateProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "noop");
        provider.set("k", "v", None).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap(), None);
    }

    #[cfg(not(feature = "state-redis"))]
    #[tokio::test]
    async fn test_redis_without_feature_degrades() {
        let config = StateStoreConfig {
            backend: StateBackend::Redis,
            redis_url: Some("redis://localhost:6379".to_string()),
            ..Default::default()
        };
        let provider = StateProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "noop");
    }
}
