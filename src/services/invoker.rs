//! # Service Invoker
//!
//! One downstream call = circuit breaker around bounded retry around a single HTTP
//! exchange. All failures leave as an [`OrchestratorError`]:
//!
//! - `CircuitOpen` when the breaker rejected the call (never retried)
//! - `Service` once retries are spent or on a non-retryable response
//! - `Configuration` for unknown services or unsupported methods, before any call

use super::health::ServiceHealth;
use super::transport::{DownstreamTransport, HttpMethod, HttpTransport, ServiceRequest};
use crate::config::{OrchestratorConfig, ServiceConfig};
use crate::error::{OrchestratorError, Result};
use crate::resilience::{CircuitBreakerManager, RetryExecutor, SystemCircuitBreakerMetrics};
use futures::future::join_all;
use reqwest::Url;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Invokes downstream services with per-service breakers and shared retry policy
#[derive(Debug, Clone)]
pub struct ServiceInvoker {
    services: HashMap<String, ServiceConfig>,
    breakers: Arc<CircuitBreakerManager>,
    retry: RetryExecutor,
    transport: Arc<dyn DownstreamTransport>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Duration,
    health_check_timeout: Duration,
}

impl ServiceInvoker {
    /// Build an invoker with the reqwest transport
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.http.user_agent)
            .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &OrchestratorConfig, transport: Arc<dyn DownstreamTransport>) -> Self {
        let timeouts = config
            .services
            .keys()
            .map(|name| (name.clone(), config.request_timeout_for(name)))
            .collect();

        Self {
            services: config.services.clone(),
            breakers: Arc::new(CircuitBreakerManager::from_config(&config.circuit_breakers)),
            retry: RetryExecutor::new(config.retry.to_policy()),
            transport,
            timeouts,
            default_timeout: Duration::from_millis(config.http.default_timeout_ms),
            health_check_timeout: Duration::from_millis(config.http.health_check_timeout_ms),
        }
    }

    /// Replace the retry executor (deterministic jitter in tests and benchmarks)
    pub fn with_retry_executor(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Breaker registry shared by every call through this invoker
    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    /// Breaker metrics for every registered service, creating breakers not yet used
    pub async fn circuit_breaker_metrics(&self) -> SystemCircuitBreakerMetrics {
        for name in self.services.keys() {
            self.breakers.get_circuit_breaker(name).await;
        }
        self.breakers.get_system_metrics().await
    }

    /// Open the breaker of a registered service so its calls are rejected without
    /// reaching the network
    pub async fn isolate_service(&self, service_name: &str) -> Result<()> {
        if !self.services.contains_key(service_name) {
            return Err(OrchestratorError::configuration(format!(
                "Cannot isolate unknown service '{service_name}'"
            )));
        }
        self.breakers.force_open(service_name).await;
        Ok(())
    }

    pub fn registered_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Call `endpoint` on `service_name` with a JSON payload.
    ///
    /// `endpoint` is either a path joined to the service's base URL or an absolute
    /// URL. `method` is `GET` or `POST` (case-insensitive).
    pub async fn call_service(
        &self,
        service_name: &str,
        endpoint: &str,
        payload: &Value,
        method: &str,
    ) -> Result<Value> {
        let method: HttpMethod = method.parse().map_err(OrchestratorError::Configuration)?;
        self.invoke(service_name, endpoint, payload, method).await
    }

    /// Typed-method variant of [`Self::call_service`]
    #[instrument(skip(self, payload), fields(service = service_name, endpoint = endpoint, method = %method))]
    pub async fn invoke(
        &self,
        service_name: &str,
        endpoint: &str,
        payload: &Value,
        method: HttpMethod,
    ) -> Result<Value> {
        let request = ServiceRequest {
            service: service_name.to_string(),
            method,
            url: self.resolve_url(service_name, endpoint)?,
            payload: payload.clone(),
            timeout: self.timeout_for(service_name),
        };

        let breaker = self.breakers.get_circuit_breaker(service_name).await;
        let start = Instant::now();

        let result = breaker
            .call_classified(
                || async {
                    self.retry
                        .retry_with_backoff(|| self.transport.send(&request))
                        .await
                        .map_err(OrchestratorError::service)
                },
                OrchestratorError::counts_as_service_failure,
            )
            .await
            .map_err(OrchestratorError::from_breaker);

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(service = service_name, duration_ms, "Downstream call succeeded"),
            Err(OrchestratorError::CircuitOpen { .. }) => {
                warn!(service = service_name, "Circuit open, downstream call skipped")
            }
            Err(e) => error!(service = service_name, duration_ms, error = %e, "Downstream call failed"),
        }

        result
    }

    /// Probe `GET {base_url}/`; bypasses breakers and retries. Only 200 is healthy.
    pub async fn check_service_health(&self, service_name: &str) -> ServiceHealth {
        let Some(service) = self.services.get(service_name) else {
            return ServiceHealth::Unhealthy {
                error: format!("Unknown service '{service_name}'"),
            };
        };

        let url = match join_url(&service.base_url, "/") {
            Ok(url) => url,
            Err(e) => return ServiceHealth::Unhealthy { error: e.to_string() },
        };

        match self
            .transport
            .probe(service_name, &url, self.health_check_timeout)
            .await
        {
            Ok(200) => ServiceHealth::Healthy,
            Ok(status) => ServiceHealth::Degraded { status_code: status },
            Err(e) => ServiceHealth::Unhealthy { error: e.to_string() },
        }
    }

    /// Health of every registered service, probed concurrently
    pub async fn check_all_services(&self) -> BTreeMap<String, ServiceHealth> {
        let names = self.registered_services();
        let results = join_all(names.iter().map(|name| self.check_service_health(name))).await;
        names.into_iter().zip(results).collect()
    }

    fn timeout_for(&self, service_name: &str) -> Duration {
        self.timeouts
            .get(service_name)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    fn resolve_url(&self, service_name: &str, endpoint: &str) -> Result<Url> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Url::parse(endpoint).map_err(|e| {
                OrchestratorError::configuration(format!("Invalid endpoint URL '{endpoint}': {e}"))
            });
        }

        let service = self.services.get(service_name).ok_or_else(|| {
            OrchestratorError::configuration(format!(
                "Unknown service '{service_name}' for endpoint '{endpoint}'"
            ))
        })?;

        join_url(&service.base_url, endpoint)
    }
}

fn join_url(base_url: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| OrchestratorError::configuration(format!("Invalid service URL '{joined}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitState, FixedJitter, RetryPolicy};
    use crate::services::ServiceCallError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Transport returning scripted outcomes in order, repeating the last one
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<std::result::Result<Value, ServiceCallError>>>,
        requests: Mutex<Vec<ServiceRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<std::result::Result<Value, ServiceCallError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl DownstreamTransport for ScriptedTransport {
        async fn send(&self, request: &ServiceRequest) -> std::result::Result<Value, ServiceCallError> {
            self.requests.lock().push(request.clone());
            let mut outcomes = self.outcomes.lock();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap_or(Ok(Value::Null))
            } else {
                outcomes.front().cloned().unwrap_or(Ok(Value::Null))
            }
        }

        async fn probe(
            &self,
            _service: &str,
            url: &Url,
            _timeout: Duration,
        ) -> std::result::Result<u16, ServiceCallError> {
            match url.port() {
                Some(3008) => Ok(503),
                Some(3009) => Ok(204),
                Some(3010) => Err(ServiceCallError::connection("design_rules", "refused")),
                _ => Ok(200),
            }
        }
    }

    fn invoker(transport: Arc<ScriptedTransport>) -> ServiceInvoker {
        let mut config = OrchestratorConfig::for_testing();
        config.circuit_breakers.default_config.failure_threshold = 2;
        ServiceInvoker::with_transport(&config, transport).with_retry_executor(
            RetryExecutor::with_jitter(
                RetryPolicy {
                    max_retries: 3,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                },
                Arc::new(FixedJitter(0.0)),
            ),
        )
    }

    #[tokio::test]
    async fn test_call_service_resolves_url_and_returns_json() {
        let transport = ScriptedTransport::new(vec![Ok(json!({"ok": true}))]);
        let invoker = invoker(transport.clone());

        let result = invoker
            .call_service("rag_service", "/query", &json!({"query": "x"}), "post")
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": true}));

        let requests = transport.requests.lock();
        assert_eq!(requests[0].url.as_str(), "http://localhost:3008/query");
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Err(ServiceCallError::http_status("rag_service", 503, "busy")),
            Err(ServiceCallError::connection("rag_service", "reset")),
            Ok(json!({"results": []})),
        ]);
        let invoker = invoker(transport.clone());

        let result = invoker
            .invoke("rag_service", "/query", &json!({}), HttpMethod::Post)
            .await;
        assert!(result.is_ok());
        assert_eq!(transport.request_count(), 3);

        let breaker = invoker.circuit_breakers().get_circuit_breaker("rag_service").await;
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_count_once_against_breaker() {
        let transport = ScriptedTransport::new(vec![Err(ServiceCallError::http_status(
            "content_generator",
            500,
            "boom",
        ))]);
        let invoker = invoker(transport.clone());

        let err = invoker
            .invoke("content_generator", "/generate-content", &json!({}), HttpMethod::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Service { .. }));
        assert!(err.to_string().contains("500"));
        assert_eq!(transport.request_count(), 4);

        let breaker = invoker
            .circuit_breakers()
            .get_circuit_breaker("content_generator")
            .await;
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_transport() {
        let transport = ScriptedTransport::new(vec![Err(ServiceCallError::http_status(
            "design_rules",
            502,
            "bad gateway",
        ))]);
        let invoker = invoker(transport.clone());

        for _ in 0..2 {
            let _ = invoker
                .invoke("design_rules", "/validate-design", &json!({}), HttpMethod::Post)
                .await;
        }
        let sent = transport.request_count();

        let err = invoker
            .invoke("design_rules", "/validate-design", &json!({}), HttpMethod::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CircuitOpen { ref service } if service == "design_rules"));
        assert_eq!(transport.request_count(), sent);
    }

    #[tokio::test]
    async fn test_configuration_errors_surface_before_any_call() {
        let transport = ScriptedTransport::new(vec![Ok(json!({}))]);
        let invoker = invoker(transport.clone());

        let unsupported = invoker
            .call_service("rag_service", "/query", &json!({}), "PATCH")
            .await
            .unwrap_err();
        assert!(unsupported.is_configuration());

        let unknown = invoker
            .call_service("nonexistent", "/x", &json!({}), "POST")
            .await
            .unwrap_err();
        assert!(unknown.is_configuration());
        assert_eq!(transport.request_count(), 0);

        tokio_test::assert_ok!(
            invoker
                .call_service("nonexistent", "http://127.0.0.1:9/x", &json!({}), "GET")
                .await
        );
    }

    #[tokio::test]
    async fn test_invalid_response_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(ServiceCallError::invalid_response(
            "template_recommender",
            "expected value at line 1",
        ))]);
        let invoker = invoker(transport.clone());

        let err = invoker
            .invoke("template_recommender", "/recommend-templates", &json!({}), HttpMethod::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Service { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_health_checks_classify_responses() {
        let transport = ScriptedTransport::new(vec![Ok(json!({}))]);
        let invoker = invoker(transport);

        let all = invoker.check_all_services().await;
        assert_eq!(all.len(), 4);
        assert_eq!(all["template_recommender"], ServiceHealth::Healthy);
        assert_eq!(all["rag_service"], ServiceHealth::Degraded { status_code: 503 });
        assert_eq!(all["content_generator"], ServiceHealth::Degraded { status_code: 204 });
        assert!(matches!(all["design_rules"], ServiceHealth::Unhealthy { .. }));
        assert!(matches!(
            invoker.check_service_health("missing").await,
            ServiceHealth::Unhealthy { .. }
        ));
    }

    #[tokio::test]
    async fn test_per_service_timeout_override() {
        let transport = ScriptedTransport::new(vec![Ok(json!({}))]);
        let mut config = OrchestratorConfig::for_testing();
        if let Some(rag) = config.services.get_mut("rag_service") {
            rag.timeout_ms = Some(4_000);
        }
        let invoker = ServiceInvoker::with_transport(&config, transport.clone());

        invoker
            .invoke("rag_service", "/query", &json!({}), HttpMethod::Post)
            .await
            .unwrap();
        invoker
            .invoke("design_rules", "/validate-design", &json!({}), HttpMethod::Post)
            .await
            .unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests[0].timeout, Duration::from_millis(4_000));
        assert_eq!(requests[1].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_isolated_service_rejected_without_network() {
        let transport = ScriptedTransport::new(vec![Ok(json!({}))]);
        let invoker = invoker(transport.clone());

        invoker.isolate_service("rag_service").await.unwrap();
        let err = invoker
            .invoke("rag_service", "/query", &json!({}), HttpMethod::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CircuitOpen { .. }));
        assert_eq!(transport.request_count(), 0);

        let metrics = invoker.circuit_breaker_metrics().await;
        assert_eq!(metrics.circuit_breakers.len(), 4);
        assert_eq!(metrics.open_circuits(), vec!["rag_service".to_string()]);

        assert!(invoker.isolate_service("nonexistent").await.unwrap_err().is_configuration());
    }

    #[test]
    fn test_join_url_normalizes_slashes() {
        assert_eq!(
            join_url("http://localhost:3007/", "/recommend-templates").unwrap().as_str(),
            "http://localhost:3007/recommend-templates"
        );
        assert_eq!(
            join_url("http://localhost:3007", "/").unwrap().as_str(),
            "http://localhost:3007/"
        );
    }
}
