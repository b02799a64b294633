//! # Orchestration
//!
//! Sequential pipelines of downstream service calls with per-step required/optional
//! policy and durable progress tracking.
//!
//! - [`Pipeline`] / [`PipelineStep`]: ordered step descriptors with payload builders
//! - [`reference_pipeline`]: the website generation pipeline
//! - [`WorkflowCoordinator`]: generic step runner over a pipeline

pub mod coordinator;
pub mod pipeline;
pub mod reference_pipeline;
pub mod types;

pub use coordinator::WorkflowCoordinator;
pub use pipeline::{Pipeline, PipelineStep, StepContext, StepPlan, StepSummary};
pub use reference_pipeline::{reference_pipeline, selected_template_id};
pub use types::{
    AssembledResult, HealthReport, OrchestrationInput, OrchestrationOutput, StateStoreHealth,
    StepDisposition, StepExecutionRecord, WorkflowExecutionMetrics,
};
