//! # Structured Logging Module
//!
//! Environment-aware structured logging for workflows and their step invocations.
//! Output is human-readable by default or JSON lines when `logging.json` is set.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process for the resolved `environment`.
///
/// `RUST_LOG` wins over `logging.level`, which wins over the environment default.
pub fn init_structured_logging(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = resolve_log_level(config, environment);

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedders and test harnesses may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized, keeping existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Configured level, or the default for `environment`
pub fn resolve_log_level(config: &LoggingConfig, environment: &str) -> String {
    config
        .level
        .clone()
        .unwrap_or_else(|| get_log_level(environment))
}

/// Default log level for an environment
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for workflow lifecycle events
pub fn log_workflow_operation(
    operation: &str,
    workflow_id: &str,
    session_id: &str,
    status: &str,
    progress: Option<f64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        workflow_id = %workflow_id,
        session_id = %session_id,
        status = %status,
        progress = progress,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "WORKFLOW_OPERATION"
    );
}

/// Log structured data for pipeline step events
pub fn log_step_operation(
    operation: &str,
    workflow_id: &str,
    step: &str,
    service: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        workflow_id = %workflow_id,
        step = %step,
        service = %service,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "STEP_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_level_follows_resolved_environment() {
        let defaults = LoggingConfig {
            level: None,
            json: false,
        };
        assert_eq!(resolve_log_level(&defaults, "production"), "info");
        assert_eq!(resolve_log_level(&defaults, "development"), "debug");

        let explicit = LoggingConfig {
            level: Some("warn".to_string()),
            json: false,
        };
        assert_eq!(resolve_log_level(&explicit, "production"), "warn");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig {
            level: Some("warn".to_string()),
            json: true,
        };
        init_structured_logging(&config, "test");
        init_structured_logging(&config, "test");
        log_workflow_operation("create", "wf_test", "session", "processing", Some(0.0), None);
    }
}
