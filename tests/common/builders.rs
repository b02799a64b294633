//! Builders wiring a coordinator to mockito-hosted downstream services

use mockito::{Matcher, Mock, ServerGuard};
use orchestrator_core::config::{
    CircuitBreakerComponentConfig, OrchestratorConfig, ServiceConfig,
};
use orchestrator_core::orchestration::{reference_pipeline, OrchestrationInput, WorkflowCoordinator};
use orchestrator_core::resilience::{FixedJitter, RetryExecutor};
use orchestrator_core::services::{HttpTransport, ServiceInvoker};
use orchestrator_core::state::{KeyValueStore, WorkflowStateStore};
use serde_json::{json, Value};
use std::sync::Arc;

pub const REFERENCE_SERVICES: [&str; 4] = [
    "template_recommender",
    "rag_service",
    "content_generator",
    "design_rules",
];

/// Test configuration with every reference service pointed at `server`
pub fn config_for_server(server: &ServerGuard) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::for_testing();
    for service in REFERENCE_SERVICES {
        config
            .services
            .insert(service.to_string(), ServiceConfig::new(server.url()));
    }
    config.http.default_timeout_ms = 2_000;
    config
}

/// Lower one component's breaker threshold
pub fn with_breaker_threshold(mut config: OrchestratorConfig, service: &str, threshold: u32) -> OrchestratorConfig {
    config.circuit_breakers.component_configs.insert(
        service.to_string(),
        CircuitBreakerComponentConfig {
            failure_threshold: threshold,
            reset_timeout_seconds: 60,
        },
    );
    config
}

/// Coordinator over real HTTP with deterministic, millisecond backoff
pub fn build_coordinator<S: KeyValueStore>(
    config: &OrchestratorConfig,
    store: S,
) -> WorkflowCoordinator<S> {
    let transport = HttpTransport::new(&config.http.user_agent).expect("http client");
    let invoker = ServiceInvoker::with_transport(config, Arc::new(transport)).with_retry_executor(
        RetryExecutor::with_jitter(config.retry.to_policy(), Arc::new(FixedJitter(0.0))),
    );
    let state = WorkflowStateStore::new(store, &config.state_store);
    let pipeline = reference_pipeline(&config.pipeline).expect("reference pipeline");
    WorkflowCoordinator::new(invoker, state, pipeline)
}

pub fn bakery_input() -> OrchestrationInput {
    serde_json::from_value(json!({
        "sessionId": "session-42",
        "processed_input": {"description": "artisan bakery in Lisbon", "pages": ["home", "menu"]},
        "branding": {"primary_color": "#aa5500"}
    }))
    .expect("valid input")
}

pub async fn mock_json(server: &mut ServerGuard, path: &str, body: Value) -> Mock {
    server
        .mock("POST", path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

pub async fn mock_status(server: &mut ServerGuard, path: &str, status: usize, hits: usize) -> Mock {
    server
        .mock("POST", path)
        .with_status(status)
        .with_body("downstream exploded")
        .expect(hits)
        .create_async()
        .await
}

pub async fn mock_template(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/recommend-templates")
        .match_body(Matcher::PartialJson(json!({"sessionId": "session-42"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"recommendations": [{"templateId": "tpl-rustic", "score": 0.93}]}).to_string())
        .create_async()
        .await
}

pub async fn mock_content(server: &mut ServerGuard) -> Mock {
    mock_json(
        server,
        "/generate-content",
        json!({"pages": [{"slug": "home", "title": "Fresh bread"}, {"slug": "menu"}]}),
    )
    .await
}
