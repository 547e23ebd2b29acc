//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and a JSON log file, plus the
//! structured event helpers used by probes, breakers, the registry and the scaling
//! advisor so every control-plane decision lands in the log with the same field names.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::ControlPlaneError;
use crate::models::{InstanceRole, ProbeResult, ScalingEvent};
use crate::resilience::CircuitStatus;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber. When the log
/// directory cannot be created, logging continues on the console only.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        let log_dir = PathBuf::from("log");
        let file_name = format!(
            "{}.{}.{}.log",
            environment,
            process::id(),
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let (file_layer, guard) = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&log_dir, &file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(env_filter(&log_level));
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("log directory unavailable, console logging only: {e}");
                (None, None)
            }
        };

        // Another subscriber (a test harness, an embedding service) may already be set
        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_file = %log_dir.join(&file_name).display(),
            file_output = guard.is_some(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );

        // The writer flushes for the life of the process
        std::mem::forget(guard);
    });
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("BULWARK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log one probe outcome. Failures and over-budget successes are warnings.
pub fn log_probe_result(result: &ProbeResult, probe: &str, latency_budget_ms: u64) {
    if !result.success {
        tracing::warn!(
            dependency_id = %result.dependency_id,
            probe = probe,
            latency_ms = result.latency_ms,
            error_kind = ?result.error_kind,
            error = result.error_message.as_deref(),
            "🩺 PROBE_FAILED"
        );
    } else if result.is_slow(latency_budget_ms) {
        tracing::warn!(
            dependency_id = %result.dependency_id,
            probe = probe,
            latency_ms = result.latency_ms,
            latency_budget_ms = latency_budget_ms,
            "🐢 PROBE_SLOW"
        );
    } else {
        tracing::debug!(
            dependency_id = %result.dependency_id,
            probe = probe,
            latency_ms = result.latency_ms,
            "🩺 PROBE_OK"
        );
    }
}

/// Log a circuit state change
pub fn log_circuit_transition(
    dependency_id: &str,
    from: CircuitStatus,
    to: CircuitStatus,
    consecutive_failures: u32,
    next_attempt_at: Option<DateTime<Utc>>,
) {
    let next_attempt_at = next_attempt_at.map(|at| at.to_rfc3339());
    match to {
        CircuitStatus::Open => tracing::warn!(
            dependency_id = %dependency_id,
            from = %from,
            to = %to,
            consecutive_failures = consecutive_failures,
            next_attempt_at = next_attempt_at.as_deref(),
            "🔴 CIRCUIT_TRANSITION"
        ),
        CircuitStatus::HalfOpen => tracing::info!(
            dependency_id = %dependency_id,
            from = %from,
            to = %to,
            "🟡 CIRCUIT_TRANSITION"
        ),
        CircuitStatus::Closed => tracing::info!(
            dependency_id = %dependency_id,
            from = %from,
            to = %to,
            "🟢 CIRCUIT_TRANSITION"
        ),
    }
}

/// Log structured data for registry operations
pub fn log_registry_operation(
    operation: &str,
    instance_id: &str,
    role: Option<InstanceRole>,
    registered: usize,
) {
    tracing::info!(
        operation = %operation,
        instance_id = %instance_id,
        role = role.map(|r| r.to_string()).as_deref(),
        registered = registered,
        "📚 REGISTRY_OPERATION"
    );
}

/// Log a scaling evaluation; emitted actions at info, the rest at debug
pub fn log_scaling_decision(event: &ScalingEvent, samples: usize) {
    if event.is_actionable() || event.suppressed_by_cooldown() {
        tracing::info!(
            target_group = %event.target,
            action = %event.action,
            proposed_action = %event.proposed_action,
            trigger_type = %event.trigger_type,
            trigger_value = event.trigger_value,
            threshold_value = event.threshold_value,
            cooldown_until = event.cooldown_until.map(|at| at.to_rfc3339()).as_deref(),
            samples = samples,
            "📈 SCALING_DECISION"
        );
    } else {
        tracing::debug!(
            target_group = %event.target,
            trigger_value = event.trigger_value,
            samples = samples,
            "📈 SCALING_DECISION: no change"
        );
    }
}

/// Log error with full context
pub fn log_error(error: &ControlPlaneError, operation: &str) {
    tracing::error!(
        operation = %operation,
        error = %error,
        retryable = error.is_retryable(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("BULWARK_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("BULWARK_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
