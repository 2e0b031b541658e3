//! Configuration for warden-daemon

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use warden_orchestrator::OrchestratorConfig;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitoring/policy configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from an optional file plus WARDEN_* environment
    /// variables, layered over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    // Loopback only by default; exposing the daemon is a deployment choice.
    SocketAddr::from(([127, 0, 0, 1], 8600))
}

fn default_true() -> bool {
    true
}

/// Monitoring and lifecycle policy configuration (seconds-based knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_busy_cpu_pct")]
    pub busy_cpu_pct: f64,

    #[serde(default = "default_busy_memory_pct")]
    pub busy_memory_pct: f64,

    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,

    #[serde(default = "default_max_runtime_secs")]
    pub max_runtime_secs: u64,

    /// Interval of the background sweep that auto-revokes expired tokens.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            busy_cpu_pct: default_busy_cpu_pct(),
            busy_memory_pct: default_busy_memory_pct(),
            max_idle_secs: default_max_idle_secs(),
            max_runtime_secs: default_max_runtime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            monitor_interval: Duration::from_secs(self.interval_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            busy_cpu_pct: self.busy_cpu_pct,
            busy_memory_pct: self.busy_memory_pct,
            max_idle: Duration::from_secs(self.max_idle_secs),
            max_runtime: Duration::from_secs(self.max_runtime_secs),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_busy_cpu_pct() -> f64 {
    10.0
}

fn default_busy_memory_pct() -> f64 {
    50.0
}

fn default_max_idle_secs() -> u64 {
    3600
}

fn default_max_runtime_secs() -> u64 {
    8 * 3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8600);
        assert!(config.server.enable_cors);
        assert_eq!(config.monitor.interval_secs, 30);
    }

    #[test]
    fn test_monitor_config_conversion() {
        let monitor = MonitorConfig::default();
        let orchestrator = monitor.to_orchestrator_config();
        assert_eq!(orchestrator.monitor_interval, Duration::from_secs(30));
        assert_eq!(orchestrator.max_runtime, Duration::from_secs(8 * 3600));
    }
}
