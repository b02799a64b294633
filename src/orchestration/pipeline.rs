//! # Pipeline
//!
//! An ordered list of [`PipelineStep`] descriptors. Each step names the service and
//! endpoint it calls, whether its failure is fatal, the cumulative progress reached
//! when it finishes, and how its request payload is built from the request plus the
//! outputs of earlier steps.
//!
//! The coordinator only walks this list; everything pipeline-specific lives in the
//! payload builders, output extractors and the result assembler.

use super::types::{AssembledResult, OrchestrationInput};
use crate::config::StepOverride;
use crate::error::{OrchestratorError, Result};
use crate::services::HttpMethod;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What a step does for one workflow
#[derive(Debug, Clone, PartialEq)]
pub enum StepPlan {
    /// Call the service with this payload
    Invoke(Value),
    /// Do not call the service; use this value as the step output
    Skip(Value),
}

/// Everything a payload builder can see
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub input: &'a OrchestrationInput,
    /// Outputs of the steps that already ran, keyed by step name
    pub outputs: &'a HashMap<String, Value>,
}

impl StepContext<'_> {
    /// Output of an earlier step, `Value::Null` when it has not run
    pub fn output(&self, step: &str) -> &Value {
        self.outputs.get(step).unwrap_or(&Value::Null)
    }
}

pub type PayloadBuilder = Arc<dyn Fn(&StepContext<'_>) -> Result<StepPlan> + Send + Sync>;
pub type OutputExtractor = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type ResultAssembler = Arc<dyn Fn(&StepContext<'_>) -> Result<AssembledResult> + Send + Sync>;

/// Static description of one pipeline step
#[derive(Clone)]
pub struct PipelineStep {
    pub name: String,
    pub service: String,
    pub endpoint: String,
    pub method: HttpMethod,
    /// Failure aborts the workflow when true; otherwise `fallback` is substituted
    pub required: bool,
    /// Cumulative progress reached when this step finishes
    pub progress_weight: f64,
    pub fallback: Value,
    payload_builder: PayloadBuilder,
    output_extractor: Option<OutputExtractor>,
}

impl PipelineStep {
    /// A required POST step
    pub fn new<F>(
        name: impl Into<String>,
        service: impl Into<String>,
        endpoint: impl Into<String>,
        progress_weight: f64,
        payload_builder: F,
    ) -> Self
    where
        F: Fn(&StepContext<'_>) -> Result<StepPlan> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            service: service.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::Post,
            required: true,
            progress_weight,
            fallback: Value::Null,
            payload_builder: Arc::new(payload_builder),
            output_extractor: None,
        }
    }

    /// Make the step optional, degrading to `fallback` on failure
    pub fn optional(mut self, fallback: Value) -> Self {
        self.required = false;
        self.fallback = fallback;
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Transform the raw service response before it is stored as the step output
    pub fn with_output_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.output_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn plan(&self, ctx: &StepContext<'_>) -> Result<StepPlan> {
        (self.payload_builder)(ctx)
    }

    pub fn extract_output(&self, response: Value) -> Value {
        match &self.output_extractor {
            Some(extract) => extract(response),
            None => response,
        }
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            name: self.name.clone(),
            service: self.service.clone(),
            endpoint: self.endpoint.clone(),
            method: self.method.to_string(),
            required: self.required,
            progress_weight: self.progress_weight,
            fallback: (!self.required).then(|| self.fallback.clone()),
        }
    }

    fn apply_override(&mut self, step_override: &StepOverride) -> Result<()> {
        if let Some(required) = step_override.required {
            self.required = required;
        }
        if let Some(weight) = step_override.progress_weight {
            self.progress_weight = weight;
        }
        if let Some(endpoint) = &step_override.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(method) = &step_override.method {
            self.method = method.parse().map_err(|e: String| {
                OrchestratorError::configuration(format!("Step '{}': {e}", self.name))
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("required", &self.required)
            .field("progress_weight", &self.progress_weight)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a step, for logs and the config validator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub service: String,
    pub endpoint: String,
    pub method: String,
    pub required: bool,
    pub progress_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

/// Validated, ordered list of steps plus the result assembler
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    assembler: ResultAssembler,
}

impl Pipeline {
    /// Validate and build a pipeline. The default assembler returns every step
    /// output under its step name as `website_generation_data`.
    pub fn new(steps: Vec<PipelineStep>) -> Result<Self> {
        validate_steps(&steps)?;
        Ok(Self {
            steps,
            assembler: Arc::new(collect_outputs),
        })
    }

    pub fn with_assembler<F>(mut self, assembler: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> Result<AssembledResult> + Send + Sync + 'static,
    {
        self.assembler = Arc::new(assembler);
        self
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Service names called by this pipeline, in step order without duplicates
    pub fn services(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .map(|s| s.service.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Apply per-step overrides by name; an unknown name is a configuration error
    pub fn apply_overrides(mut self, overrides: &HashMap<String, StepOverride>) -> Result<Self> {
        let mut names: Vec<&String> = overrides.keys().collect();
        names.sort();

        for name in names {
            let step = self
                .steps
                .iter_mut()
                .find(|s| &s.name == name)
                .ok_or_else(|| {
                    OrchestratorError::configuration(format!("Unknown pipeline step '{name}'"))
                })?;
            step.apply_override(&overrides[name])?;
        }

        validate_steps(&self.steps)?;
        Ok(self)
    }

    pub fn assemble(&self, ctx: &StepContext<'_>) -> Result<AssembledResult> {
        (self.assembler)(ctx)
    }

    pub fn summaries(&self) -> Vec<StepSummary> {
        self.steps.iter().map(PipelineStep::summary).collect()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

fn collect_outputs(ctx: &StepContext<'_>) -> Result<AssembledResult> {
    let data: Map<String, Value> = ctx
        .outputs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(AssembledResult {
        website_generation_data: Some(Value::Object(data)),
        pages: None,
    })
}

fn validate_steps(steps: &[PipelineStep]) -> Result<()> {
    if steps.is_empty() {
        return Err(OrchestratorError::configuration("Pipeline has no steps"));
    }

    let mut names = HashSet::new();
    let mut previous_weight = 0.0;
    for step in steps {
        if step.name.trim().is_empty() || step.service.trim().is_empty() {
            return Err(OrchestratorError::configuration(
                "Pipeline step requires a name and a service",
            ));
        }
        if step.endpoint.trim().is_empty() {
            return Err(OrchestratorError::configuration(format!(
                "Step '{}' has an empty endpoint",
                step.name
            )));
        }
        if !names.insert(step.name.as_str()) {
            return Err(OrchestratorError::configuration(format!(
                "Duplicate pipeline step '{}'",
                step.name
            )));
        }
        if !(0.0..=1.0).contains(&step.progress_weight) {
            return Err(OrchestratorError::configuration(format!(
                "Step '{}' progress_weight {} outside [0, 1]",
                step.name, step.progress_weight
            )));
        }
        if step.progress_weight < previous_weight {
            return Err(OrchestratorError::configuration(format!(
                "Step '{}' progress_weight {} is below the preceding step's {}",
                step.name, step.progress_weight, previous_weight
            )));
        }
        previous_weight = step.progress_weight;
    }
    Ok(())
}
