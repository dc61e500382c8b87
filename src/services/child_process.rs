//! Child process ownership: launch, output draining, termination
//!
//! One `ChildProcessHandle` owns at most one OS process, ever. The handle
//! spawns the process with piped stdio, drains stdout and stderr line by
//! line on background tasks, and hands the `Child` itself to a single waiter
//! task. The waiter is the only place an exit notice is produced, which is
//! what makes the notice exactly-once even when a self-exit races a
//! requested termination.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::events::{ExitNotice, OutputLine, OutputStream};
use crate::traits::ProcessSinks;

#[derive(Debug)]
pub struct ChildProcessHandle {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    grace_period: Duration,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    spawned: bool,
    running: Arc<AtomicBool>,
    terminate_requested: Arc<AtomicBool>,
    terminate_signal: Arc<Notify>,
}

impl ChildProcessHandle {
    pub fn new(program: PathBuf, grace_period: Duration) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: Vec::new(),
            grace_period,
            pid: None,
            stdin: None,
            spawned: false,
            running: Arc::new(AtomicBool::new(false)),
            terminate_requested: Arc::new(AtomicBool::new(false)),
            terminate_signal: Arc::new(Notify::new()),
        }
    }

    /// Append arguments (fluent API)
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append environment overrides (fluent API)
    pub fn with_envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// OS process id, valid only while the process is running.
    pub fn pid(&self) -> Option<u32> {
        if self.is_running() {
            self.pid
        } else {
            None
        }
    }

    /// Spawn the process and wire up output draining and the exit waiter.
    ///
    /// Fails if this handle already launched a process (a handle is single
    /// use; relaunching means creating a fresh handle), if the executable is
    /// missing, or if the OS refuses the spawn. Must be called on a tokio
    /// runtime: the reader loops and the waiter are spawned tasks.
    pub fn launch(&mut self, sinks: ProcessSinks) -> SupervisorResult<()> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning {
                pid: self.pid.unwrap_or(0),
            });
        }
        if self.spawned {
            return Err(SupervisorError::HandleSpent);
        }
        if !self.program.exists() {
            return Err(SupervisorError::ExecutableNotFound {
                path: self.program.clone(),
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::piped());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::SpawnFailed {
            program: self.program.display().to_string(),
            source,
        })?;

        self.spawned = true;
        self.pid = child.id();
        self.running.store(true, Ordering::SeqCst);

        if let Some(stdout) = child.stdout.take() {
            spawn_line_drain(stdout, OutputStream::Stdout, sinks.output.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_drain(stderr, OutputStream::Stderr, sinks.output.clone());
        }
        self.stdin = child.stdin.take();

        debug!(program = %self.program.display(), pid = self.pid, "spawned child process");
        self.spawn_exit_waiter(child, sinks.exit);
        Ok(())
    }

    /// Write raw bytes to the child's stdin. Available only while running.
    pub async fn write_to_stdin(&mut self, bytes: &[u8]) -> SupervisorResult<()> {
        if !self.is_running() {
            return Err(SupervisorError::StdinUnavailable);
        }
        let stdin = self.stdin.as_mut().ok_or(SupervisorError::StdinUnavailable)?;
        stdin.write_all(bytes).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Request termination. Idempotent and non-blocking.
    ///
    /// Sends SIGTERM immediately; the exit waiter escalates to a forceful
    /// kill if the process outlives the grace period. Calling this on an
    /// already-terminated handle is a no-op.
    pub fn terminate(&self) {
        if !self.is_running() {
            return;
        }
        if self.terminate_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(pid, %err, "SIGTERM delivery failed (process may already be gone)");
            }
        }

        self.terminate_signal.notify_one();
    }

    fn spawn_exit_waiter(&self, mut child: Child, exit_tx: mpsc::UnboundedSender<ExitNotice>) {
        let running = Arc::clone(&self.running);
        let requested = Arc::clone(&self.terminate_requested);
        let signal = Arc::clone(&self.terminate_signal);
        let grace = self.grace_period;
        let pid = self.pid.unwrap_or(0);

        tokio::spawn(async move {
            let self_exit = tokio::select! {
                status = child.wait() => Some(status),
                _ = signal.notified() => None,
            };

            let status = match self_exit {
                Some(status) => status,
                // Termination was requested: allow the grace period, then
                // force a kill if the process ignored the signal.
                None => match tokio::time::timeout(grace, child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(pid, "process ignored termination; escalating to forceful kill");
                        let _ = child.start_kill();
                        child.wait().await
                    }
                },
            };

            running.store(false, Ordering::SeqCst);

            let code = status.ok().and_then(|s| s.code());
            let notice = ExitNotice {
                pid,
                code,
                requested: requested.load(Ordering::SeqCst),
            };
            debug!(pid, code = ?notice.code, requested = notice.requested, "child process exited");
            let _ = exit_tx.send(notice);
        });
    }
}

/// Drain one stream line by line, forwarding to the observer channel.
///
/// Forwarding uses an unbounded sender, so the reader loop never blocks on
/// a slow observer. When the observer goes away the loop keeps reading and
/// discards lines, so the child can never stall on a full pipe.
fn spawn_line_drain<R>(stream: R, source: OutputStream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut forward = true;
        while let Ok(Some(line)) = lines.next_line().await {
            if forward && tx.send(OutputLine { stream: source, line }).is_err() {
                forward = false;
            }
        }
    });
}
