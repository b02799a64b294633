//! # Orchestrate
//!
//! Runs one orchestration request against the configured downstream services and
//! prints the result as JSON. The request is read from a file or stdin.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchestrator_core::config::ConfigManager;
use orchestrator_core::logging::init_structured_logging;
use orchestrator_core::orchestration::{OrchestrationInput, WorkflowCoordinator};
use orchestrator_core::resilience::SystemCircuitBreakerMetrics;
use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "orchestrate")]
#[command(about = "Run a website generation workflow against downstream services")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to apply (default: ORCHESTRATOR_ENV, APP_ENV or development)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one orchestration request
    Run {
        /// JSON request file; `-` or omitted reads stdin
        input: Option<PathBuf>,

        /// Overall deadline in seconds, overriding configuration
        #[arg(short, long)]
        timeout_seconds: Option<u64>,

        /// Print per-step and circuit breaker metrics to stderr
        #[arg(long)]
        metrics: bool,

        /// Open a service's circuit before running, so it is never called (repeatable)
        #[arg(long = "isolate", value_name = "SERVICE")]
        isolate: Vec<String>,
    },

    /// Report downstream service health, circuit breakers and the state backend.
    /// Exits with status 3 when anything is unhealthy.
    Health,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let environment = cli
        .environment
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;
    init_structured_logging(&manager.config().logging, manager.environment());

    let coordinator = WorkflowCoordinator::from_config(manager.config())
        .await
        .context("failed to initialize workflow coordinator")?;

    match cli.command {
        Commands::Run {
            input,
            timeout_seconds,
            metrics,
            isolate,
        } => {
            for service in &isolate {
                coordinator
                    .invoker()
                    .isolate_service(service)
                    .await
                    .with_context(|| format!("failed to isolate {service}"))?;
            }

            let request = read_request(input)?;
            let output = match timeout_seconds {
                Some(seconds) => {
                    coordinator
                        .orchestrate_with_timeout(request, Duration::from_secs(seconds))
                        .await
                }
                None if metrics => {
                    let (output, metrics) = coordinator.orchestrate_with_metrics(request).await;
                    eprintln!("{}", serde_json::to_string_pretty(&metrics)?);
                    output
                }
                None => coordinator.orchestrate(request).await,
            };

            if metrics {
                print_breaker_summaries(&coordinator.invoker().circuit_breaker_metrics().await);
            }

            println!("{}", serde_json::to_string_pretty(&output)?);
            if !output.is_success() {
                process::exit(2);
            }
        }
        Commands::Health => {
            let report = coordinator.health_report().await;
            print_breaker_summaries(&report.circuit_breakers);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                process::exit(3);
            }
        }
    }

    Ok(())
}

fn print_breaker_summaries(metrics: &SystemCircuitBreakerMetrics) {
    let mut names: Vec<&String> = metrics.circuit_breakers.keys().collect();
    names.sort();
    for name in names {
        eprintln!("{name}: {}", metrics.circuit_breakers[name].format_summary());
    }
}

fn read_request(path: Option<PathBuf>) -> Result<OrchestrationInput> {
    let raw = match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read request from stdin")?;
            buffer
        }
    };

    serde_json::from_str(&raw).context("request is not a valid orchestration input")
}
