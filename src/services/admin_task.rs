//! One-shot administrative tasks against the backend archive
//!
//! Shares the child-process launch primitive with the server, but there is
//! no health loop: the task runs once, its stdout is captured, and the call
//! resolves when the process exits. Used for out-of-band commands such as
//! resetting an account password.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::BackendPaths;
use crate::error::{SupervisorError, SupervisorResult};
use crate::events::OutputStream;
use crate::services::child_process::ChildProcessHandle;
use crate::traits::ProcessSinks;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

pub struct AdminTask {
    paths: BackendPaths,
    timeout: Duration,
    grace_period: Duration,
}

impl AdminTask {
    pub fn new(paths: BackendPaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Bound the whole task (fluent API)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the archive once with the given subcommand arguments and collect
    /// its stdout lines. Resolves to an error when the process exits
    /// non-zero or outlives the task timeout.
    pub async fn run(&self, args: &[&str]) -> SupervisorResult<Vec<String>> {
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();

        let (mut task_args, envs) = base_command(&self.paths);
        task_args.extend(args.iter().map(|s| s.to_string()));

        let mut handle = ChildProcessHandle::new(self.paths.runtime.clone(), self.grace_period)
            .with_args(task_args)
            .with_envs(envs);
        handle.launch(ProcessSinks {
            output: output_tx,
            exit: exit_tx,
        })?;

        let collect = async {
            let mut stdout_lines = Vec::new();
            let mut last_stderr = None;
            // The channel closes once both reader loops hit EOF, which only
            // happens after the process is gone.
            while let Some(line) = output_rx.recv().await {
                match line.stream {
                    OutputStream::Stdout => stdout_lines.push(line.line),
                    OutputStream::Stderr => last_stderr = Some(line.line),
                }
            }
            let notice = exit_rx.recv().await;
            (stdout_lines, last_stderr, notice)
        };

        let (stdout_lines, last_stderr, notice) =
            match tokio::time::timeout(self.timeout, collect).await {
                Ok(result) => result,
                Err(_) => {
                    handle.terminate();
                    return Err(SupervisorError::AdminTaskFailed {
                        message: format!("timed out after {:?}", self.timeout),
                    });
                }
            };

        match notice {
            Some(notice) if notice.code == Some(0) => {
                debug!(lines = stdout_lines.len(), "admin task completed");
                Ok(stdout_lines)
            }
            Some(notice) => Err(SupervisorError::AdminTaskFailed {
                message: last_stderr
                    .unwrap_or_else(|| format!("exit code {:?}", notice.code)),
            }),
            None => Err(SupervisorError::AdminTaskFailed {
                message: "process exit was never observed".to_string(),
            }),
        }
    }

    /// Reset the password for an account and return the reset token the
    /// backend prints as its final line of output.
    pub async fn reset_password(&self, email: &str) -> SupervisorResult<String> {
        let lines = self.run(&["reset-password", email]).await?;
        lines
            .into_iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| SupervisorError::AdminTaskFailed {
                message: "no reset token in task output".to_string(),
            })
    }
}

/// Same runtime/archive/data contract as the server launch, minus the port:
/// one-shot tasks do not listen.
fn base_command(paths: &BackendPaths) -> (Vec<String>, Vec<(String, String)>) {
    let args = vec!["-jar".to_string(), paths.archive.display().to_string()];
    let envs = vec![
        ("BACKEND_DB_FILE".to_string(), paths.data_file.display().to_string()),
        (
            "BACKEND_PLUGINS_DIR".to_string(),
            paths.plugins_dir.display().to_string(),
        ),
    ];
    (args, envs)
}
