//! # Orchestrator Configuration Validator
//!
//! Command-line tool for validating orchestrator configuration across environments.
//! Loads the layered configuration, validates it, and prints the sanitized result and
//! the resolved pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use orchestrator_core::config::{ConfigManager, OrchestratorConfig};
use orchestrator_core::orchestration::reference_pipeline;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate orchestrator configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate everything and print a summary
    All,

    /// Print the sanitized configuration as JSON
    Show,

    /// Print the resolved pipeline steps as JSON
    Pipeline,

    /// Validate one section
    Component {
        /// Section name (http, retry, circuit_breakers, services, pipeline, state_store)
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::All) | None => validate_all(&manager),
        Some(Commands::Show) => show(&manager),
        Some(Commands::Pipeline) => show_pipeline(manager.config()),
        Some(Commands::Component { name }) => validate_component(manager.config(), name),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("failed to load configuration for '{}'", cli.environment))
}

fn validate_all(manager: &ConfigManager) -> Result<()> {
    let config = manager.config();
    println!("🔧 Validating Orchestrator Configuration");
    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!();
    println!("✅ Configuration loaded and validated");

    let pipeline = reference_pipeline(&config.pipeline).context("pipeline overrides are invalid")?;
    for service in pipeline.services() {
        if !config.services.contains_key(service) {
            bail!("pipeline calls unregistered service '{service}'");
        }
    }
    println!("✅ Pipeline resolved ({} steps)", pipeline.len());

    for step in pipeline.summaries() {
        println!(
            "   {:<26} {:<22} {} {:<22} weight={:.2} {}",
            step.name,
            step.service,
            step.method,
            step.endpoint,
            step.progress_weight,
            if step.required { "required" } else { "optional" }
        );
    }

    println!(
        "✅ Retry: max_retries={} base_delay={}ms max_delay={}ms",
        config.retry.max_retries, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!(
        "✅ Circuit breakers: default threshold={} reset={}s, {} component override(s)",
        config.circuit_breakers.default_config.failure_threshold,
        config.circuit_breakers.default_config.reset_timeout_seconds,
        config.circuit_breakers.component_configs.len()
    );
    println!("✅ State store: {:?}", config.state_store.backend);

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn show(manager: &ConfigManager) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

fn show_pipeline(config: &OrchestratorConfig) -> Result<()> {
    let pipeline = reference_pipeline(&config.pipeline)?;
    println!("{}", serde_json::to_string_pretty(&pipeline.summaries())?);
    Ok(())
}

fn validate_component(config: &OrchestratorConfig, name: &str) -> Result<()> {
    match name.to_lowercase().replace('-', "_").as_str() {
        "http" => println!("default_timeout_ms = {}", config.http.default_timeout_ms),
        "retry" => println!("{:?}", config.retry.to_policy()),
        "circuit_breakers" => {
            let mut names: Vec<&String> = config.circuit_breakers.component_configs.keys().collect();
            names.sort();
            for service in names {
                let resolved = config.circuit_breakers.config_for_component(service);
                println!(
                    "{service}: failure_threshold={} reset_timeout={}s",
                    resolved.failure_threshold, resolved.reset_timeout_seconds
                );
            }
        }
        "services" => {
            let mut names: Vec<&String> = config.services.keys().collect();
            names.sort();
            for service in names {
                println!(
                    "{service}: timeout={:?}",
                    config.request_timeout_for(service)
                );
            }
        }
        "pipeline" => {
            reference_pipeline(&config.pipeline)?;
        }
        "state_store" => println!("{:?}", config.state_store.backend),
        other => bail!("Unknown component: {other}"),
    }

    println!("✅ Component '{name}' validation passed!");
    Ok(())
}
