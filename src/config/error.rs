//! Configuration Error Types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Layered sources could not be merged or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Invalid step configuration for '{step_name}': {error}")]
    InvalidStepConfig { step_name: String, error: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_step_config(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::InvalidStepConfig {
            step_name: step_name.into(),
            error: error.into(),
        }
    }
}

impl From<ConfigurationError> for crate::error::OrchestratorError {
    fn from(err: ConfigurationError) -> Self {
        crate::error::OrchestratorError::Configuration(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
