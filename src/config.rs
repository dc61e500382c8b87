//! Supervisor configuration
//!
//! All tunables live here and are passed explicitly into the supervisor at
//! construction; there is no global settings singleton. A JSON settings file
//! can populate any subset of fields (serde defaults fill the rest) and the
//! CLI overrides individual values on top.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SupervisorError, SupervisorResult};

/// Filesystem inputs for launching the backend, supplied by the installer
/// or the development environment. Only existence is validated here; the
/// paths themselves are opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendPaths {
    /// Runtime executable used to run the server archive (e.g. a bundled JRE)
    pub runtime: PathBuf,
    /// Server archive handed to the runtime
    pub archive: PathBuf,
    /// Persistent data file the server opens on boot
    pub data_file: PathBuf,
    /// Directory the server scans for plugins
    pub plugins_dir: PathBuf,
}

/// Cadence and window tunables for the health monitor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub watchdog_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 1_000,
            probe_timeout_ms: 500,
            watchdog_timeout_ms: 60_000,
        }
    }
}

impl MonitorConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    pub paths: BackendPaths,

    /// Port to try first; an ephemeral port is used when it is taken
    #[serde(default = "default_preferred_port")]
    pub preferred_port: u16,

    /// Path of the liveness endpoint, relative to the server root
    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default)]
    pub monitor: MonitorConfig,

    /// How long a terminated process gets to exit before the forceful kill
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Consecutive failed restart attempts tolerated before giving up
    #[serde(default = "default_restart_budget")]
    pub restart_budget: u32,
}

fn default_preferred_port() -> u16 {
    3000
}

fn default_health_path() -> String {
    "api/health".to_string()
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_restart_budget() -> u32 {
    3
}

impl SupervisorConfig {
    /// Convenience constructor with every tunable at its default.
    pub fn with_paths(paths: BackendPaths) -> Self {
        Self {
            paths,
            preferred_port: default_preferred_port(),
            health_path: default_health_path(),
            monitor: MonitorConfig::default(),
            grace_period_ms: default_grace_period_ms(),
            restart_budget: default_restart_budget(),
        }
    }

    /// Read a settings file once at startup.
    pub fn from_file(path: &Path) -> SupervisorResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Reject combinations the monitor cannot honor.
    ///
    /// The per-probe timeout must be strictly below the probe interval so
    /// consecutive probes never overlap.
    pub fn validate(&self) -> SupervisorResult<()> {
        if self.monitor.probe_interval_ms == 0 {
            return Err(SupervisorError::ConfigError {
                message: "probe_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.monitor.probe_timeout_ms >= self.monitor.probe_interval_ms {
            return Err(SupervisorError::ConfigError {
                message: format!(
                    "probe_timeout_ms ({}) must be strictly less than probe_interval_ms ({})",
                    self.monitor.probe_timeout_ms, self.monitor.probe_interval_ms
                ),
            });
        }
        if self.monitor.watchdog_timeout_ms < self.monitor.probe_interval_ms {
            return Err(SupervisorError::ConfigError {
                message: "watchdog_timeout_ms must be at least one probe interval".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> BackendPaths {
        BackendPaths {
            runtime: PathBuf::from("/usr/bin/java"),
            archive: PathBuf::from("/opt/backend/server.jar"),
            data_file: PathBuf::from("/tmp/backend.db"),
            plugins_dir: PathBuf::from("/tmp/plugins"),
        }
    }

    #[test]
    fn partial_settings_file_fills_defaults() {
        let raw = r#"{
            "paths": {
                "runtime": "/usr/bin/java",
                "archive": "/opt/backend/server.jar",
                "data_file": "/tmp/backend.db",
                "plugins_dir": "/tmp/plugins"
            },
            "preferred_port": 4000
        }"#;
        let config: SupervisorConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.preferred_port, 4000);
        assert_eq!(config.health_path, "api/health");
        assert_eq!(config.monitor.probe_interval_ms, 1_000);
        assert_eq!(config.restart_budget, 3);
        config.validate().unwrap();
    }

    #[test]
    fn probe_timeout_must_undercut_interval() {
        let mut config = SupervisorConfig::with_paths(test_paths());
        config.monitor.probe_timeout_ms = config.monitor.probe_interval_ms;
        assert!(matches!(
            config.validate(),
            Err(SupervisorError::ConfigError { .. })
        ));
    }

    #[test]
    fn watchdog_must_cover_a_probe_interval() {
        let mut config = SupervisorConfig::with_paths(test_paths());
        config.monitor.watchdog_timeout_ms = 10;
        assert!(config.validate().is_err());
    }
}
