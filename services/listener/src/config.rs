//! Listener configuration.
//!
//! Read from the JSON file named by `LISTENER_CONFIG_PATH`; any key can be
//! overridden with a `LISTENER_<KEY>` environment variable.

use std::net::SocketAddr;
use std::path::Path;

use ::config::{Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::metrics::MetricLabels;
use crate::scaler::{RunnerBounds, ScalerConfig};

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "LISTENER_CONFIG_PATH";

/// Prefix of the override environment variables.
pub const ENV_PREFIX: &str = "LISTENER";

const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{CONFIG_PATH_ENV} environment variable is not set")]
    MissingPath,

    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("ephemeral_runner_set_namespace {namespace:?} or ephemeral_runner_set_name {name:?} is missing")]
    MissingRunnerSet { namespace: String, name: String },

    #[error("min_runners {0} cannot be negative")]
    NegativeMinRunners(i32),

    #[error("min_runners {min} cannot be greater than max_runners {max}")]
    InvalidBounds { min: i32, max: i32 },

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid metrics_addr {addr:?}: {reason}")]
    InvalidMetricsAddr { addr: String, reason: String },

    #[error("invalid metrics_endpoint {0:?}: must be a static absolute path other than /healthz")]
    InvalidMetricsEndpoint(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Namespace of the runner set.
    pub ephemeral_runner_set_namespace: String,

    /// Name of the runner set to scale.
    pub ephemeral_runner_set_name: String,

    /// Upstream scale set name, used as a metrics label.
    #[serde(default)]
    pub runner_scale_set_name: String,

    #[serde(default)]
    pub min_runners: i32,

    #[serde(default = "default_max_runners")]
    pub max_runners: i32,

    /// Log level (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Telemetry listen address; empty disables the telemetry server.
    #[serde(default)]
    pub metrics_addr: String,

    #[serde(default = "default_metrics_endpoint")]
    pub metrics_endpoint: String,

}

/// Absolute path without captures or wildcards, so the router can mount it verbatim.
fn is_static_route(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}

fn default_max_runners() -> i32 {
    i32::MAX
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_endpoint() -> String {
    "/metrics".to_string()
}

impl Config {
    /// Load from the file named by [`CONFIG_PATH_ENV`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).ok_or(ConfigError::MissingPath)?;
        Self::load(Path::new(&path))
    }

    /// Load, overlay environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Json))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ephemeral_runner_set_namespace.is_empty() || self.ephemeral_runner_set_name.is_empty() {
            return Err(ConfigError::MissingRunnerSet {
                namespace: self.ephemeral_runner_set_namespace.clone(),
                name: self.ephemeral_runner_set_name.clone(),
            });
        }

        if self.min_runners < 0 {
            return Err(ConfigError::NegativeMinRunners(self.min_runners));
        }

        if self.max_runners < self.min_runners {
            return Err(ConfigError::InvalidBounds {
                min: self.min_runners,
                max: self.max_runners,
            });
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }

        if !is_static_route(&self.metrics_endpoint) || self.metrics_endpoint == "/healthz" {
            return Err(ConfigError::InvalidMetricsEndpoint(
                self.metrics_endpoint.clone(),
            ));
        }

        self.metrics_socket_addr()?;

        Ok(())
    }

    /// Parsed telemetry address, `None` when telemetry is disabled.
    pub fn metrics_socket_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        if self.metrics_addr.is_empty() {
            return Ok(None);
        }

        self.metrics_addr
            .parse()
            .map(Some)
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidMetricsAddr {
                addr: self.metrics_addr.clone(),
                reason: e.to_string(),
            })
    }

    pub fn scaler_config(&self) -> ScalerConfig {
        ScalerConfig {
            namespace: self.ephemeral_runner_set_namespace.clone(),
            name: self.ephemeral_runner_set_name.clone(),
            bounds: RunnerBounds {
                min_runners: self.min_runners,
                max_runners: self.max_runners,
            },
        }
    }

    pub fn metric_labels(&self) -> MetricLabels {
        MetricLabels {
            name: self.ephemeral_runner_set_name.clone(),
            namespace: self.ephemeral_runner_set_namespace.clone(),
            scale_set_name: self.runner_scale_set_name.clone(),
        }
    }
}
