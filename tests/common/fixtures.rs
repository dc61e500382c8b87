//! Test data builders for supervisor tests

use std::path::PathBuf;

use supervisor::{BackendPaths, MonitorConfig, SupervisorConfig};

/// Paths that point nowhere. Scripted launchers never touch the filesystem,
/// so these only need to satisfy the config shape.
pub fn dummy_paths() -> BackendPaths {
    BackendPaths {
        runtime: PathBuf::from("/nonexistent/runtime"),
        archive: PathBuf::from("/nonexistent/server.jar"),
        data_file: PathBuf::from("/nonexistent/data.db"),
        plugins_dir: PathBuf::from("/nonexistent/plugins"),
    }
}

/// Config tuned for paused-clock tests: probe every 1s, watchdog at 2.5s.
/// With a permanently failing probe the watchdog fires at the 3s tick.
pub fn fast_config() -> SupervisorConfig {
    let mut config = SupervisorConfig::with_paths(dummy_paths());
    config.monitor = MonitorConfig {
        probe_interval_ms: 1_000,
        probe_timeout_ms: 500,
        watchdog_timeout_ms: 2_500,
    };
    config.grace_period_ms = 100;
    config
}

/// Same tunables with a caller-chosen restart budget.
pub fn fast_config_with_budget(restart_budget: u32) -> SupervisorConfig {
    let mut config = fast_config();
    config.restart_budget = restart_budget;
    config
}

/// Config with a watchdog far enough out that it never fires during a test.
pub fn patient_config() -> SupervisorConfig {
    let mut config = fast_config();
    config.monitor.watchdog_timeout_ms = 600_000;
    config
}
