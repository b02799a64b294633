//! # Workflow Coordinator
//!
//! Drives one [`Pipeline`] per orchestration request: creates the workflow record,
//! runs the steps in order through the [`ServiceInvoker`], tracks progress in the
//! [`WorkflowStateStore`], and turns the run into an [`OrchestrationOutput`].
//!
//! ## Step Policy
//!
//! - success: the (extracted) response becomes the step output, progress advances
//! - optional step, service failure or open circuit: fallback substituted, run continues
//! - required step failure, or any configuration error: record marked Failed, run stops
//!
//! A panic inside a run is caught and recorded as a failure. State store errors are
//! logged and never change the outcome of a workflow.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orchestrator_core::config::OrchestratorConfig;
//! use orchestrator_core::orchestration::{OrchestrationInput, WorkflowCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = WorkflowCoordinator::from_config(&OrchestratorConfig::default()).await?;
//!
//! let input: OrchestrationInput = serde_json::from_str(
//!     r#"{"session_id": "s-1", "processed_input": {"description": "bakery"}}"#,
//! )?;
//! let output = coordinator.orchestrate(input).await;
//! println!("{} -> {}", output.workflow_id, output.status);
//! # Ok(())
//! # }
//! ```

use super::pipeline::{Pipeline, StepContext, StepPlan};
use super::reference_pipeline::reference_pipeline;
use super::types::{
    AssembledResult, HealthReport, OrchestrationInput, OrchestrationOutput, StateStoreHealth,
    StepDisposition, StepExecutionRecord, WorkflowExecutionMetrics,
};
use crate::config::OrchestratorConfig;
use crate::constants::workflow;
use crate::error::{OrchestratorError, Result};
use crate::logging::{log_error, log_step_operation, log_workflow_operation};
use crate::services::{ServiceHealth, ServiceInvoker};
use crate::state::{
    KeyValueStore, StateProvider, StoreResult, WorkflowRecord, WorkflowStateStore,
    WorkflowUpdate,
};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Runs pipelines against downstream services and records their progress
pub struct WorkflowCoordinator<S = StateProvider> {
    invoker: Arc<ServiceInvoker>,
    store: Arc<WorkflowStateStore<S>>,
    pipeline: Arc<Pipeline>,
    workflow_timeout: Option<Duration>,
}

impl<S> Clone for WorkflowCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            store: Arc::clone(&self.store),
            pipeline: Arc::clone(&self.pipeline),
            workflow_timeout: self.workflow_timeout,
        }
    }
}

impl<S> fmt::Debug for WorkflowCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowCoordinator")
            .field("pipeline", &self.pipeline)
            .field("workflow_timeout", &self.workflow_timeout)
            .finish_non_exhaustive()
    }
}

impl WorkflowCoordinator<StateProvider> {
    /// Validate configuration and wire the reference pipeline to HTTP services and
    /// the configured state backend
    pub async fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;

        let invoker = ServiceInvoker::from_config(config)?;
        let provider = StateProvider::from_config_graceful(&config.state_store).await;
        let store = WorkflowStateStore::new(provider, &config.state_store);
        let pipeline = reference_pipeline(&config.pipeline)?;

        for service in pipeline.services() {
            if !config.services.contains_key(service) {
                return Err(OrchestratorError::configuration(format!(
                    "Pipeline calls unregistered service '{service}'"
                )));
            }
        }

        info!(
            steps = pipeline.len(),
            services = ?pipeline.services(),
            state_backend = ?config.state_store.backend,
            "Workflow coordinator initialized"
        );

        Ok(Self::new(invoker, store, pipeline)
            .with_workflow_timeout(config.orchestration.workflow_timeout()))
    }
}

impl<S: KeyValueStore> WorkflowCoordinator<S> {
    pub fn new(invoker: ServiceInvoker, store: WorkflowStateStore<S>, pipeline: Pipeline) -> Self {
        Self {
            invoker: Arc::new(invoker),
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
            workflow_timeout: None,
        }
    }

    /// Deadline applied by [`Self::orchestrate`]
    pub fn with_workflow_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.workflow_timeout = timeout;
        self
    }

    pub fn invoker(&self) -> &ServiceInvoker {
        &self.invoker
    }

    pub fn store(&self) -> &WorkflowStateStore<S> {
        &self.store
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline for one request. Never fails: errors are reported as an
    /// output with `status = failed`.
    pub async fn orchestrate(&self, input: OrchestrationInput) -> OrchestrationOutput {
        match self.workflow_timeout {
            Some(timeout) => self.orchestrate_with_timeout(input, timeout).await,
            None => self.orchestrate_with_metrics(input).await.0,
        }
    }

    /// [`Self::orchestrate`] without a deadline, also returning per-step metrics
    pub async fn orchestrate_with_metrics(
        &self,
        input: OrchestrationInput,
    ) -> (OrchestrationOutput, WorkflowExecutionMetrics) {
        let record = self.start_workflow(&input).await;
        self.execute(&record, &input).await
    }

    /// Run with a caller-level deadline. When it elapses the in-flight step is
    /// abandoned and the record is marked Failed.
    pub async fn orchestrate_with_timeout(
        &self,
        input: OrchestrationInput,
        timeout: Duration,
    ) -> OrchestrationOutput {
        let record = self.start_workflow(&input).await;

        match tokio::time::timeout(timeout, self.execute(&record, &input)).await {
            Ok((output, _)) => output,
            Err(_) => {
                let message = format!(
                    "{}: workflow exceeded {}ms deadline",
                    workflow::FAILURE_PREFIX,
                    timeout.as_millis()
                );
                warn!(
                    workflow_id = %record.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Workflow deadline elapsed"
                );
                let progress = self
                    .best_effort(&record.id, "get", self.store.get(&record.id))
                    .await
                    .flatten()
                    .map_or(record.progress, |stored| stored.progress);
                self.finish_failed(&record, progress, message).await
            }
        }
    }

    /// Stored record for a workflow, if the backend still has it
    pub async fn workflow_status(&self, workflow_id: &str) -> Result<Option<WorkflowRecord>> {
        Ok(self.store.get(workflow_id).await?)
    }

    /// Health of every registered downstream service
    pub async fn check_services(&self) -> BTreeMap<String, ServiceHealth> {
        self.invoker.check_all_services().await
    }

    /// Service health, breaker metrics and state backend reachability
    pub async fn health_report(&self) -> HealthReport {
        let (services, circuit_breakers, backend) = tokio::join!(
            self.check_services(),
            self.invoker.circuit_breaker_metrics(),
            self.store.health_check(),
        );

        let provider = self.store.backend().provider_name().to_string();
        let state_store = match backend {
            Ok(reachable) => StateStoreHealth {
                provider,
                reachable,
                error: None,
            },
            Err(e) => StateStoreHealth {
                provider,
                reachable: false,
                error: Some(e.to_string()),
            },
        };

        HealthReport {
            open_circuits: circuit_breakers.open_circuits(),
            services,
            circuit_breakers,
            state_store,
        }
    }

    async fn start_workflow(&self, input: &OrchestrationInput) -> WorkflowRecord {
        let record = WorkflowRecord::new(input.session_id.clone());
        self.best_effort(&record.id, "create", self.store.create(&record))
            .await;
        log_workflow_operation(
            "start",
            &record.id,
            &record.session_id,
            &record.status.to_string(),
            Some(record.progress),
            None,
        );
        record
    }

    #[instrument(skip(self, record, input), fields(workflow_id = %record.id, session_id = %record.session_id))]
    async fn execute(
        &self,
        record: &WorkflowRecord,
        input: &OrchestrationInput,
    ) -> (OrchestrationOutput, WorkflowExecutionMetrics) {
        let start = Instant::now();
        let mut metrics = WorkflowExecutionMetrics::new(&record.id);
        let mut progress = record.progress;

        let outcome = AssertUnwindSafe(self.run_steps(&record.id, input, &mut metrics, &mut progress))
            .catch_unwind()
            .await;
        metrics.total_duration_ms = start.elapsed().as_millis() as u64;

        let output = match outcome {
            Ok(Ok(assembled)) => {
                self.persist(&record.id, &WorkflowUpdate::completed()).await;
                log_workflow_operation(
                    "complete",
                    &record.id,
                    &record.session_id,
                    "completed",
                    Some(1.0),
                    Some(&format!(
                        "degraded_steps={:?} duration_ms={}",
                        metrics.degraded_steps(),
                        metrics.total_duration_ms
                    )),
                );
                OrchestrationOutput::completed(&record.id, &record.session_id, assembled)
            }
            Ok(Err(e)) => {
                let message = format!("{}: {e}", workflow::FAILURE_PREFIX);
                self.finish_failed(record, progress, message).await
            }
            Err(panic) => {
                log_error(
                    "workflow_coordinator",
                    "orchestrate",
                    &panic_message(panic.as_ref()),
                    Some(&record.id),
                );
                let message = format!(
                    "{}: {}",
                    workflow::FAILURE_PREFIX,
                    workflow::INTERNAL_FAILURE_MESSAGE
                );
                self.finish_failed(record, progress, message).await
            }
        };

        (output, metrics)
    }

    async fn run_steps(
        &self,
        workflow_id: &str,
        input: &OrchestrationInput,
        metrics: &mut WorkflowExecutionMetrics,
        progress: &mut f64,
    ) -> Result<AssembledResult> {
        let mut outputs: HashMap<String, Value> = HashMap::with_capacity(self.pipeline.len());

        for step in self.pipeline.steps() {
            self.persist(workflow_id, &WorkflowUpdate::step_started(&step.name))
                .await;
            let step_start = Instant::now();

            let plan = step.plan(&StepContext {
                input,
                outputs: &outputs,
            })?;

            let (output, disposition) = match plan {
                StepPlan::Skip(value) => {
                    debug!(step = %step.name, "Step skipped, output supplied by request");
                    (value, StepDisposition::Skipped)
                }
                StepPlan::Invoke(payload) => match self
                    .invoker
                    .invoke(&step.service, &step.endpoint, &payload, step.method)
                    .await
                {
                    Ok(response) => (step.extract_output(response), StepDisposition::Succeeded),
                    Err(e) if !step.required && e.is_degradable() => {
                        warn!(
                            workflow_id = workflow_id,
                            step = %step.name,
                            service = %step.service,
                            error = %e,
                            "Optional step failed, using fallback"
                        );
                        (step.fallback.clone(), StepDisposition::Degraded)
                    }
                    Err(e) => {
                        let duration_ms = step_start.elapsed().as_millis() as u64;
                        metrics.steps.push(StepExecutionRecord {
                            step: step.name.clone(),
                            service: step.service.clone(),
                            disposition: StepDisposition::Failed,
                            duration_ms,
                        });
                        log_step_operation(
                            "step_failed",
                            workflow_id,
                            &step.name,
                            &step.service,
                            "failed",
                            Some(duration_ms),
                            Some(&e.to_string()),
                        );
                        return Err(e);
                    }
                },
            };

            let duration_ms = step_start.elapsed().as_millis() as u64;
            metrics.steps.push(StepExecutionRecord {
                step: step.name.clone(),
                service: step.service.clone(),
                disposition,
                duration_ms,
            });
            outputs.insert(step.name.clone(), output);
            *progress = progress.max(step.progress_weight);

            self.persist(
                workflow_id,
                &WorkflowUpdate::step_finished(&step.name, step.progress_weight),
            )
            .await;
            log_step_operation(
                "step_finished",
                workflow_id,
                &step.name,
                &step.service,
                disposition_label(disposition),
                Some(duration_ms),
                None,
            );
        }

        self.pipeline.assemble(&StepContext {
            input,
            outputs: &outputs,
        })
    }

    async fn finish_failed(
        &self,
        record: &WorkflowRecord,
        progress: f64,
        message: String,
    ) -> OrchestrationOutput {
        self.persist(&record.id, &WorkflowUpdate::failed(message.clone()))
            .await;
        log_workflow_operation(
            "fail",
            &record.id,
            &record.session_id,
            "failed",
            Some(progress),
            Some(&message),
        );
        OrchestrationOutput::failed(&record.id, &record.session_id, progress, message)
    }

    async fn persist(&self, workflow_id: &str, update: &WorkflowUpdate) {
        self.best_effort(workflow_id, "update", self.store.update(workflow_id, update))
            .await;
    }

    /// State store calls never decide the outcome: errors and panics are logged only
    async fn best_effort<T>(
        &self,
        workflow_id: &str,
        operation: &str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Option<T> {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(
                    workflow_id = workflow_id,
                    operation = operation,
                    error = %e,
                    "Workflow state operation failed"
                );
                None
            }
            Err(panic) => {
                log_error(
                    "workflow_state_store",
                    operation,
                    &panic_message(panic.as_ref()),
                    Some(workflow_id),
                );
                None
            }
        }
    }
}

fn disposition_label(disposition: StepDisposition) -> &'static str {
    match disposition {
        StepDisposition::Succeeded => "succeeded",
        StepDisposition::Skipped => "skipped",
        StepDisposition::Degraded => "degraded",
        StepDisposition::Failed => "failed",
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
