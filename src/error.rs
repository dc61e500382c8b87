//! Supervisor-specific error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("process is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("handle was already used; create a fresh handle to relaunch")]
    HandleSpent,

    #[error("executable not found: {path}")]
    ExecutableNotFound { path: PathBuf },

    #[error("failed to spawn {program}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no free port available (preferred {preferred})")]
    NoAvailablePort { preferred: u16 },

    #[error("stdin is not available; process is not running")]
    StdinUnavailable,

    #[error("supervisor is already started")]
    AlreadyStarted,

    #[error("admin task failed: {message}")]
    AdminTaskFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file error: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
