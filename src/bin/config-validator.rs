//! # Bulwark Configuration Validator
//!
//! Command-line tool for validating control-plane configuration across environments.
//! Catches invalid thresholds and unknown dependency kinds before the daemon starts.

use bulwark_core::config::loader::redact_endpoint;
use bulwark_core::config::{ConfigLoader, ControlPlaneConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate Bulwark control-plane configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment overlay to apply (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory containing bulwark.yaml (default: BULWARK_CONFIG_DIR or ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the full configuration
    All,

    /// List watched dependencies with their probe and breaker settings
    Dependencies,

    /// List environment overlays found in the configuration directory
    Environments,
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

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Dependencies) => list_dependencies(&cli),
        Some(Commands::Environments) => list_environments(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("❌ {e}");
            process::exit(1);
        }
    }
}

fn config_dir(cli: &Cli) -> PathBuf {
    cli.config_dir
        .clone()
        .unwrap_or_else(ConfigLoader::default_config_directory)
}

fn load(cli: &Cli) -> Result<ControlPlaneConfig, Box<dyn std::error::Error>> {
    Ok(ConfigLoader::load_from_directory_with_env(
        config_dir(cli),
        &cli.environment,
    )?)
}

fn validate_all(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(cli)?;

    match cli.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ConfigLoader::sanitized(&config))?
            );
        }
        OutputFormat::Table => {
            println!("🔧 Validating Bulwark Configuration");
            println!("Environment: {}", cli.environment);
            println!("Config Directory: {}", config_dir(cli).display());
            println!();
            println!("✅ {} dependencies", config.dependencies.len());
            println!(
                "✅ Circuit breaker: {} failures, {}ms cooldown",
                config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown_ms
            );
            println!(
                "✅ Registry: {}ms heartbeat, {}ms stale threshold",
                config.registry.heartbeat_interval_ms,
                config.registry.stale_threshold().as_millis()
            );
            println!("✅ Load selector: {}", config.load_selector.algorithm);
            println!(
                "✅ Scaling: {} (up at cpu>{}% / mem>{}%, down at cpu<{}% / mem<{}%, window {})",
                if config.scaling.enabled { "enabled" } else { "disabled" },
                config.scaling.cpu_scale_up_percent,
                config.scaling.memory_scale_up_percent,
                config.scaling.cpu_scale_down_percent,
                config.scaling.memory_scale_down_percent,
                config.scaling.window_size
            );
            println!(
                "✅ Coordinator: health every {}ms, at most {} probes in flight",
                config.coordinator.health_check_interval_ms,
                config.coordinator.max_concurrent_probes
            );
            println!("\n🎉 All configuration validation checks passed!");
        }
    }
    Ok(())
}

fn list_dependencies(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(cli)?;

    if let OutputFormat::Json = cli.format {
        let sanitized = ConfigLoader::sanitized(&config);
        println!("{}", serde_json::to_string_pretty(&sanitized["dependencies"])?);
        return Ok(());
    }

    println!(
        "{:<24} {:<10} {:>10} {:>10} {:>12}  endpoint",
        "id", "kind", "timeout", "failures", "cooldown"
    );
    for dependency in &config.dependencies {
        let breaker = dependency.breaker_config(&config.circuit_breaker);
        println!(
            "{:<24} {:<10} {:>8}ms {:>10} {:>10}ms  {}",
            dependency.id,
            dependency.kind.to_string(),
            dependency.probe_timeout().as_millis(),
            breaker.failure_threshold,
            breaker.cooldown_ms,
            redact_endpoint(&dependency.endpoint)
        );
    }
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let dir = config_dir(cli);
    println!("📋 Environment overlays in {}:", dir.display());

    let mut environments: Vec<String> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            name.strip_prefix("bulwark.")
                .and_then(|rest| rest.strip_suffix(".yaml"))
                .filter(|env| !env.is_empty())
                .map(str::to_string)
        })
        .collect();
    environments.sort();

    if environments.is_empty() {
        println!("  (none, base configuration only)");
    }
    for environment in environments {
        println!("  • {environment}");
    }
    Ok(())
}
