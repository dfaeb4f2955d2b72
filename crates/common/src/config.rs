//! Configuration structures for QGate
//!
//! Configurations are loaded from YAML files and can be overridden by
//! environment variables.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on the probe timeout; admission checks are meant to be interactive.
const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

/// Top-level configuration for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Liveness probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Durable store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Liveness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Socket timeout for a single probe, in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,

    /// Path of the coordinator info endpoint
    #[serde(default = "default_info_path")]
    pub info_path: String,
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub structured_logging: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_metrics")]
    pub enable_metrics: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            info_path: default_info_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            structured_logging: false,
            enable_metrics: default_metrics(),
        }
    }
}

/// Default value functions
fn default_probe_timeout() -> u64 {
    1000
}

fn default_info_path() -> String {
    "/v1/info".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/coordinators.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics() -> bool {
    true
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: GatewayConfig = serde_yaml::from_str(&content).map_err(|e| {
            GatewayError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `QGATE_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(timeout) = std::env::var("QGATE_PROBE_TIMEOUT_MS") {
            self.probe.timeout_ms = timeout.parse().map_err(|_| {
                GatewayError::config(format!("Invalid probe timeout: {}", timeout))
            })?;
        }
        if let Ok(path) = std::env::var("QGATE_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("QGATE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.probe.timeout_ms == 0 || self.probe.timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(GatewayError::config(format!(
                "Probe timeout must be within 1..={} ms, got {}",
                MAX_PROBE_TIMEOUT_MS, self.probe.timeout_ms
            )));
        }
        if !self.probe.info_path.starts_with('/') {
            return Err(GatewayError::config(format!(
                "Probe info path must start with '/': {}",
                self.probe.info_path
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(GatewayError::config("Store path must not be empty"));
        }
        Ok(())
    }

    /// Get probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }
}
