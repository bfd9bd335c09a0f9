// src/observability.rs
//! Tracing and metrics initialisation
//!
//! Metric names used across the engine live here so dashboards have a single
//! place to look them up.

use crate::utils::config::ObservabilityConfig;
use crate::utils::errors::{LabError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const AGENTS_GAUGE: &str = "simlab_agents";
pub const SIMULATORS_GAUGE: &str = "simlab_simulators";
pub const OPERATIONS_STARTED: &str = "simlab_operations_started_total";
pub const OPERATIONS_COMPLETED: &str = "simlab_operations_completed_total";
pub const OPERATION_DURATION: &str = "simlab_operation_duration_seconds";
pub const SIMULATOR_STEPS: &str = "simlab_simulator_steps_total";
pub const HTTP_REQUESTS: &str = "simlab_http_requests_total";

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| LabError::ConfigError(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| LabError::ConfigError(format!("Failed to install tracing: {}", e)))
}

/// Install the Prometheus exporter when a scrape address is configured
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(addr) = config.metrics_addr.as_deref() else {
        return Ok(());
    };

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| LabError::ConfigError(format!("Invalid metrics address {}: {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| LabError::ConfigError(format!("Failed to install metrics exporter: {}", e)))?;

    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}
