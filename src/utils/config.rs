// src/utils/config.rs
//! Engine configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `simlab.{toml,yaml,json}` file (or the file named by `SIMLAB_CONFIG`),
//! then `SIMLAB__SECTION__KEY` environment variables. The legacy
//! `SIMULATOR_API_URL` variable overrides `services.simulator_api_url`.

use crate::utils::errors::{LabError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// HTTP listener configuration for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Start this service
    pub enabled: bool,

    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Addresses of peer services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Default `api_url` for train/predict requests
    pub simulator_api_url: String,
}

/// Background execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads running train/predict operations
    pub worker_threads: usize,

    /// Directory trained models are written to and loaded from
    pub models_dir: PathBuf,

    /// Step budget used when a train request omits `total_timesteps`
    pub default_total_timesteps: u64,

    /// Episode count used when a predict request omits `eval_episodes`
    pub default_eval_episodes: u32,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,

    /// Emit JSON log lines
    pub json_logs: bool,

    /// Prometheus scrape listener, disabled when absent
    pub metrics_addr: Option<String>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    pub agent_server: ServerConfig,
    pub simulator_server: ServerConfig,
    pub services: ServicesConfig,
    pub runtime: RuntimeConfig,
    pub observability: ObservabilityConfig,
}

impl LabConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("SIMLAB_CONFIG").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load configuration, reading `path` instead of `simlab.*` when given
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("simlab").required(false),
        };

        let mut builder = Self::defaults()?
            .add_source(file)
            .add_source(Environment::with_prefix("SIMLAB").separator("__"));

        if let Ok(url) = std::env::var("SIMULATOR_API_URL") {
            builder = builder.set_override("services.simulator_api_url", url)?;
        }

        let config: LabConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("agent_server.enabled", true)?
            .set_default("agent_server.host", "0.0.0.0")?
            .set_default("agent_server.port", 8081)?
            .set_default("simulator_server.enabled", true)?
            .set_default("simulator_server.host", "0.0.0.0")?
            .set_default("simulator_server.port", 8080)?
            .set_default("services.simulator_api_url", "http://127.0.0.1:8080")?
            .set_default("runtime.worker_threads", 4)?
            .set_default("runtime.models_dir", "trained_models")?
            .set_default("runtime.default_total_timesteps", 200_000)?
            .set_default("runtime.default_eval_episodes", 100)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.json_logs", false)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.runtime.worker_threads == 0 {
            return Err(LabError::ConfigError(
                "runtime.worker_threads must be at least 1".into(),
            ));
        }

        for (name, server) in [
            ("agent_server", &self.agent_server),
            ("simulator_server", &self.simulator_server),
        ] {
            if server.enabled && server.port == 0 {
                return Err(LabError::ConfigError(format!(
                    "{}.port must be non-zero",
                    name
                )));
            }
        }

        if self.runtime.default_total_timesteps == 0 || self.runtime.default_eval_episodes == 0 {
            return Err(LabError::ConfigError(
                "runtime defaults for timesteps and episodes must be positive".into(),
            ));
        }

        Ok(())
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            agent_server: ServerConfig {
                enabled: true,
                host: "0.0.0.0".to_string(),
                port: 8081,
            },
            simulator_server: ServerConfig {
                enabled: true,
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            services: ServicesConfig {
                simulator_api_url: "http://127.0.0.1:8080".to_string(),
            },
            runtime: RuntimeConfig {
                worker_threads: 4,
                models_dir: PathBuf::from("trained_models"),
                default_total_timesteps: 200_000,
                default_eval_episodes: 100,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
                metrics_addr: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = LabConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulator_server.port, 8080);
        assert_eq!(config.agent_server.port, 8081);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[runtime]\nworker_threads = 2\nmodels_dir = \"/tmp/models\"\n\n[agent_server]\nport = 9001"
        )
        .unwrap();

        let config = LabConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.runtime.worker_threads, 2);
        assert_eq!(config.runtime.models_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.agent_server.port, 9001);
        // Untouched sections keep their defaults
        assert_eq!(config.simulator_server.port, 8080);
        assert_eq!(config.runtime.default_eval_episodes, 100);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = LabConfig::default();
        config.runtime.worker_threads = 0;
        assert!(matches!(config.validate(), Err(LabError::ConfigError(_))));
    }
}
