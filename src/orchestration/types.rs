//! # Orchestration Types
//!
//! Request, result, metrics and health types exchanged with callers of the coordinator.

use crate::resilience::SystemCircuitBreakerMetrics;
use crate::services::ServiceHealth;
use crate::state::WorkflowStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One orchestration request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationInput {
    #[serde(alias = "sessionId")]
    pub session_id: String,

    /// Normalized user input, forwarded to downstream services unchanged
    #[serde(default)]
    pub processed_input: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<Map<String, Value>>,

    /// Pre-fetched retrieval context; a non-empty list skips context retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_context: Option<Vec<Value>>,
}

impl OrchestrationInput {
    pub fn new(session_id: impl Into<String>, processed_input: Map<String, Value>) -> Self {
        Self {
            session_id: session_id.into(),
            processed_input,
            branding: None,
            rag_context: None,
        }
    }

    pub fn with_branding(mut self, branding: Map<String, Value>) -> Self {
        self.branding = Some(branding);
        self
    }

    pub fn with_rag_context(mut self, context: Vec<Value>) -> Self {
        self.rag_context = Some(context);
        self
    }

    /// Branding as a JSON value, `null` when absent
    pub fn branding_value(&self) -> Value {
        self.branding
            .as_ref()
            .map(|b| Value::Object(b.clone()))
            .unwrap_or(Value::Null)
    }

    /// Caller-provided context, only when it is non-empty
    pub fn provided_rag_context(&self) -> Option<&[Value]> {
        self.rag_context.as_deref().filter(|ctx| !ctx.is_empty())
    }
}

/// Final result of one orchestration; failures are values, never errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationOutput {
    pub workflow_id: String,
    pub session_id: String,
    pub status: WorkflowStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_generation_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrchestrationOutput {
    pub fn completed(
        workflow_id: impl Into<String>,
        session_id: impl Into<String>,
        assembled: AssembledResult,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            session_id: session_id.into(),
            status: WorkflowStatus::Completed,
            progress: 1.0,
            website_generation_data: assembled.website_generation_data,
            pages: assembled.pages,
            error: None,
        }
    }

    pub fn failed(
        workflow_id: impl Into<String>,
        session_id: impl Into<String>,
        progress: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            session_id: session_id.into(),
            status: WorkflowStatus::Failed,
            progress,
            website_generation_data: None,
            pages: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}

/// Output fields produced by a pipeline's result assembler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledResult {
    pub website_generation_data: Option<Value>,
    pub pages: Option<Vec<Value>>,
}

/// How one step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDisposition {
    /// Downstream call succeeded
    Succeeded,
    /// Not invoked; output came from the request
    Skipped,
    /// Optional step failed; fallback substituted
    Degraded,
    /// Required step failed; workflow aborted
    Failed,
}

/// Per-step timing and outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionRecord {
    pub step: String,
    pub service: String,
    pub disposition: StepDisposition,
    pub duration_ms: u64,
}

/// Execution summary of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionMetrics {
    pub workflow_id: String,
    pub steps: Vec<StepExecutionRecord>,
    pub total_duration_ms: u64,
}

impl WorkflowExecutionMetrics {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Default::default()
        }
    }

    pub fn count(&self, disposition: StepDisposition) -> usize {
        self.steps
            .iter()
            .filter(|s| s.disposition == disposition)
            .count()
    }

    pub fn degraded_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.disposition == StepDisposition::Degraded)
            .map(|s| s.step.as_str())
            .collect()
    }
}

/// Reachability of the workflow state backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStoreHealth {
    pub provider: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Operator view of downstream services, their breakers and the state backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub services: BTreeMap<String, ServiceHealth>,
    pub circuit_breakers: SystemCircuitBreakerMetrics,
    pub open_circuits: Vec<String>,
    pub state_store: StateStoreHealth,
}

impl HealthReport {
    /// Every service answered 200, no breaker is open and the backend answered
    pub fn is_healthy(&self) -> bool {
        self.services.values().all(ServiceHealth::is_healthy)
            && self.circuit_breakers.all_healthy()
            && self.state_store.reachable
    }
}
