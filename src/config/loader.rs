//! Configuration Loader
//!
//! Environment-aware layered loading: built-in defaults, `orchestrator.toml`,
//! `<environment>.toml`, then `ORCHESTRATOR__SECTION__KEY` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::OrchestratorConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base configuration file name inside the configuration directory
pub const BASE_CONFIG_FILE: &str = "orchestrator.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ORCHESTRATOR";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that must not depend on process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = environment,
            services = config.services.len(),
            state_backend = ?config.state_store.backend,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding)
    pub fn from_config(config: OrchestratorConfig, environment: &str) -> ConfigResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Configuration as JSON with sensitive fields masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: ORCHESTRATOR_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("ORCHESTRATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<OrchestratorConfig> {
        if config_directory.exists() && !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound(
                config_directory.to_path_buf(),
            ));
        }

        let base_file = config_directory.join(BASE_CONFIG_FILE);
        let env_file = config_directory.join(format!("{environment}.toml"));

        debug!(
            base_file = %base_file.display(),
            base_present = base_file.exists(),
            env_file = %env_file.display(),
            env_present = env_file.exists(),
            "Resolved configuration sources"
        );

        let settings = Config::builder()
            .add_source(Config::try_from(&OrchestratorConfig::default())?)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<OrchestratorConfig>()?)
    }

    /// Mask fields whose names look like credentials before logging
    fn sanitize_config_for_logging(config: &OrchestratorConfig) -> serde_json::Value {
        let mut config_json = serde_json::to_value(config).unwrap_or_default();
        let sensitive_patterns = ["password", "secret", "api_key", "token", "credential", "auth", "url"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    match val {
                        serde_json::Value::String(s) if is_sensitive => {
                            *val = serde_json::Value::String(mask_value(&key_lower, s));
                        }
                        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                            Self::sanitize_json_recursive(val, sensitive_patterns);
                        }
                        _ => {}
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}

/// URLs keep scheme and host with credentials stripped; other secrets show two
/// characters at each end.
fn mask_value(key: &str, value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    if key.contains("url") {
        return match reqwest::Url::parse(value) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                if !url.username().is_empty() {
                    let _ = url.set_username("***");
                }
                url.to_string()
            }
            Err(_) => "[MASKED]".to_string(),
        };
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 4 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("[MASKED: {head}***{tail}]")
    } else {
        "[MASKED: ***]".to_string()
    }
}
