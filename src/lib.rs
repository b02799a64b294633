#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, Redis in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Orchestrator Core
//!
//! Resilient coordination of multi-step pipelines over independent downstream HTTP
//! services, with durable per-workflow progress.
//!
//! ## Overview
//!
//! Each orchestration request runs an ordered pipeline of named steps. Every step calls
//! one downstream service through a per-service circuit breaker and bounded exponential
//! retry. Required steps abort the workflow when they fail; optional steps degrade to a
//! fallback value. Status and progress are recorded in a key-value backed state store
//! after every step transition.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Circuit breakers, breaker registry and retry with jittered backoff
//! - [`services`] - Downstream HTTP transport, service invoker and health checks
//! - [`state`] - Workflow records and key-value backends (memory, Redis, none)
//! - [`orchestration`] - Pipelines, the reference pipeline and the workflow coordinator
//! - [`config`] - Layered TOML/environment configuration
//! - [`error`] - Error taxonomy shared across layers
//! - [`logging`] - Structured `tracing` setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orchestrator_core::config::ConfigManager;
//! use orchestrator_core::orchestration::{OrchestrationInput, WorkflowCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! orchestrator_core::logging::init_structured_logging(&manager.config().logging, manager.environment());
//!
//! let coordinator = WorkflowCoordinator::from_config(manager.config()).await?;
//! let output = coordinator
//!     .orchestrate(OrchestrationInput::new("session-1", Default::default()))
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests (mockito-backed services)
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod state;

pub use config::{ConfigManager, OrchestratorConfig};
pub use error::{OrchestratorError, Result};
pub use orchestration::{
    OrchestrationInput, OrchestrationOutput, Pipeline, PipelineStep, WorkflowCoordinator,
};
pub use resilience::{CircuitBreaker, CircuitBreakerManager, CircuitState, RetryExecutor, RetryPolicy};
pub use services::{ServiceCallError, ServiceHealth, ServiceInvoker};
pub use state::{WorkflowRecord, WorkflowStateStore, WorkflowStatus};
