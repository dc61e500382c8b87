//! Backend server process: command construction, port selection, launch
//!
//! Specializes `ChildProcessHandle` for the backend server: picks the port
//! before the spawn (preferred, then ephemeral fallback), builds the command
//! line deterministically from the configured paths, and carries a fresh
//! `InstanceId` so health events can be matched to this exact launch.

use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{BackendPaths, SupervisorConfig};
use crate::error::{SupervisorError, SupervisorResult};
use crate::events::InstanceId;
use crate::services::child_process::ChildProcessHandle;
use crate::traits::{BackendLauncher, ProcessSinks, ServerControl};

/// Environment contract between the supervisor and the server archive.
const PORT_ENV: &str = "BACKEND_PORT";
const DB_FILE_ENV: &str = "BACKEND_DB_FILE";
const PLUGINS_DIR_ENV: &str = "BACKEND_PLUGINS_DIR";

#[derive(Debug)]
pub struct BackendServerProcess {
    handle: ChildProcessHandle,
    instance: InstanceId,
    port: u16,
}

impl BackendServerProcess {
    /// Pick a port, build the command and spawn the server.
    ///
    /// The port is fixed before the spawn and never changes for the lifetime
    /// of this instance; the health monitor probes the same value.
    pub fn launch(
        paths: &BackendPaths,
        preferred_port: u16,
        grace_period: Duration,
        sinks: ProcessSinks,
    ) -> SupervisorResult<Self> {
        ensure_exists(&paths.runtime)?;
        ensure_exists(&paths.archive)?;

        let port = select_port(preferred_port)?;
        if port != preferred_port {
            info!(preferred_port, port, "preferred port unavailable; using ephemeral port");
        }

        let (args, envs) = command_spec(paths, port);
        let mut handle = ChildProcessHandle::new(paths.runtime.clone(), grace_period)
            .with_args(args)
            .with_envs(envs);
        handle.launch(sinks)?;

        let instance = InstanceId::new();
        info!(%instance, port, pid = handle.pid(), "backend server launched");
        Ok(Self {
            handle,
            instance,
            port,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }
}

impl ServerControl for BackendServerProcess {
    fn instance(&self) -> InstanceId {
        self.instance
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    fn terminate(&self) {
        self.handle.terminate();
    }
}

/// Production launcher used by the binary.
pub struct RealBackendLauncher {
    paths: BackendPaths,
    grace_period: Duration,
}

impl RealBackendLauncher {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            paths: config.paths.clone(),
            grace_period: config.grace_period(),
        }
    }
}

#[async_trait]
impl BackendLauncher for RealBackendLauncher {
    async fn launch(
        &self,
        preferred_port: u16,
        sinks: ProcessSinks,
    ) -> SupervisorResult<Box<dyn ServerControl>> {
        let server = BackendServerProcess::launch(&self.paths, preferred_port, self.grace_period, sinks)?;
        Ok(Box::new(server))
    }
}

/// Deterministic launch recipe: identical inputs always produce identical
/// argv and environment, so two launches differ only in pid and possibly
/// port.
pub(crate) fn command_spec(paths: &BackendPaths, port: u16) -> (Vec<String>, Vec<(String, String)>) {
    let args = vec!["-jar".to_string(), paths.archive.display().to_string()];
    let envs = vec![
        (PORT_ENV.to_string(), port.to_string()),
        (DB_FILE_ENV.to_string(), paths.data_file.display().to_string()),
        (PLUGINS_DIR_ENV.to_string(), paths.plugins_dir.display().to_string()),
    ];
    (args, envs)
}

/// Use the preferred port when it can be bound; otherwise let the OS hand
/// out an ephemeral one. The probing listener is dropped immediately, which
/// releases the port for the server we are about to spawn.
pub(crate) fn select_port(preferred: u16) -> SupervisorResult<u16> {
    if TcpListener::bind(("127.0.0.1", preferred)).is_ok() {
        return Ok(preferred);
    }
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|_| SupervisorError::NoAvailablePort { preferred })?;
    let port = listener
        .local_addr()
        .map_err(|_| SupervisorError::NoAvailablePort { preferred })?
        .port();
    Ok(port)
}

fn ensure_exists(path: &Path) -> SupervisorResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(SupervisorError::ExecutableNotFound {
            path: path.to_path_buf(),
        })
    }
}
