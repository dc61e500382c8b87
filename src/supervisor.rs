//! Supervisor: ties process lifecycle to health monitoring
//!
//! Composition root wiring a `BackendLauncher` and a `HealthMonitor`
//! together using dependency injection. Health events drive exactly one
//! corrective action: a watchdog timeout terminates the current server and
//! launches a replacement under a mutual-exclusion gate, so overlapping
//! timeout signals can never double-launch against the same data file.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::core::HealthTransition;
use crate::error::{SupervisorError, SupervisorResult};
use crate::events::{HealthEvent, OutputStream, SupervisorEvent};
use crate::services::HealthMonitor;
use crate::traits::{BackendLauncher, HealthProbe, ProcessSinks};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct Supervisor<L, P>
where
    L: BackendLauncher + 'static,
    P: HealthProbe + 'static,
{
    ctx: Arc<SupervisorCtx<L, P>>,
}

struct SupervisorCtx<L, P>
where
    L: BackendLauncher + 'static,
    P: HealthProbe + 'static,
{
    config: SupervisorConfig,
    launcher: L,
    monitor: HealthMonitor<P>,
    events_tx: broadcast::Sender<SupervisorEvent>,
    current: Mutex<Option<Box<dyn crate::traits::ServerControl>>>,
    /// Held by whoever is changing the server generation: start, stop, or a
    /// watchdog-driven restart. A timeout arriving while a restart is in
    /// flight loses the `try_lock` and is dropped.
    restart_gate: Mutex<()>,
    /// Consecutive restart attempts that have not led back to Healthy
    restart_failures: AtomicU32,
    shutdown: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<L, P> Supervisor<L, P>
where
    L: BackendLauncher + 'static,
    P: HealthProbe + 'static,
{
    pub fn new(config: SupervisorConfig, launcher: L, probe: P) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let monitor = HealthMonitor::new(config.monitor.clone(), Arc::new(probe));
        Self {
            ctx: Arc::new(SupervisorCtx {
                config,
                launcher,
                monitor,
                events_tx,
                current: Mutex::new(None),
                restart_gate: Mutex::new(()),
                restart_failures: AtomicU32::new(0),
                shutdown: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register an observer. Events arrive in emission order; a receiver
    /// that cannot keep up lags rather than blocking the supervisor.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.ctx.events_tx.subscribe()
    }

    /// Port of the live server instance, if one is running.
    pub async fn current_port(&self) -> Option<u16> {
        self.ctx.current.lock().await.as_ref().map(|s| s.port())
    }

    /// Launch the backend and begin health monitoring against its port.
    pub async fn start(&self) -> SupervisorResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let _gate = ctx.restart_gate.lock().await;

        if ctx.current.lock().await.is_some() {
            return Err(SupervisorError::AlreadyStarted);
        }
        ctx.shutdown.store(false, Ordering::SeqCst);
        ctx.restart_failures.store(0, Ordering::SeqCst);

        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let (health_tx, mut health_rx) = mpsc::unbounded_channel::<HealthEvent>();
        let sinks = ProcessSinks {
            output: output_tx,
            exit: exit_tx,
        };

        let server = ctx
            .launcher
            .launch(ctx.config.preferred_port, sinks.clone())
            .await?;
        let port = server.port();
        let instance = server.instance();
        *ctx.current.lock().await = Some(server);

        ctx.monitor.start(port, instance, health_tx.clone()).await;
        info!(port, %instance, "supervisor started");

        // Output loop: log server output and treat any line as liveness
        // evidence for the watchdog.
        let output_ctx = Arc::clone(&ctx);
        let output_task = tokio::spawn(async move {
            while let Some(line) = output_rx.recv().await {
                match line.stream {
                    OutputStream::Stdout => info!(target: "supervisor::server", "{}", line.line),
                    OutputStream::Stderr => warn!(target: "supervisor::server", "{}", line.line),
                }
                output_ctx.monitor.reset_timeout().await;
            }
        });

        // Exit loop: surface deduplicated exit notices. A requested
        // termination is routine; a self-exit is worth a warning, and the
        // watchdog will expire on schedule if the server stays gone.
        let exit_events = ctx.events_tx.clone();
        let exit_task = tokio::spawn(async move {
            while let Some(notice) = exit_rx.recv().await {
                if notice.requested {
                    info!(pid = notice.pid, code = ?notice.code, "server terminated on request");
                } else {
                    warn!(pid = notice.pid, code = ?notice.code, "server exited unexpectedly");
                }
                let _ = exit_events.send(SupervisorEvent::ServerExited {
                    pid: notice.pid,
                    code: notice.code,
                    requested: notice.requested,
                });
            }
        });

        // Health loop: forward advisory transitions, restart on timeout.
        let health_ctx = Arc::clone(&ctx);
        let health_task = tokio::spawn(async move {
            while let Some(event) = health_rx.recv().await {
                if health_ctx.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let current_instance = health_ctx
                    .current
                    .lock()
                    .await
                    .as_ref()
                    .map(|s| s.instance());
                if current_instance != Some(event.instance) {
                    debug!(instance = %event.instance, "dropping event from replaced instance");
                    continue;
                }

                let _ = health_ctx.events_tx.send(SupervisorEvent::Health(event));
                match event.transition {
                    HealthTransition::BecameHealthy => {
                        health_ctx.restart_failures.store(0, Ordering::SeqCst);
                    }
                    HealthTransition::BecameUnhealthy => {}
                    HealthTransition::TimedOut => {
                        restart(&health_ctx, sinks.clone(), &health_tx).await;
                    }
                }
            }
        });

        let mut tasks = ctx.tasks.lock().await;
        tasks.push(output_task);
        tasks.push(exit_task);
        tasks.push(health_task);
        Ok(())
    }

    /// Stop monitoring first, then terminate the server, in that order: the
    /// monitor must not report a timeout caused by the shutdown it is
    /// racing against. Waits out any in-flight restart; after this returns
    /// no further events are delivered and no server instance remains.
    pub async fn stop(&self) {
        let ctx = &self.ctx;
        ctx.shutdown.store(true, Ordering::SeqCst);

        let _gate = ctx.restart_gate.lock().await;
        ctx.monitor.stop().await;
        if let Some(server) = ctx.current.lock().await.take() {
            server.terminate();
        }
        for task in ctx.tasks.lock().await.drain(..) {
            task.abort();
        }
        info!("supervisor stopped");
    }
}

/// Terminate the current server, launch a replacement and re-arm the
/// monitor. At most one restart is in flight at a time; extra timeout
/// signals are dropped at the gate.
async fn restart<L, P>(
    ctx: &Arc<SupervisorCtx<L, P>>,
    sinks: ProcessSinks,
    health_tx: &mpsc::UnboundedSender<HealthEvent>,
) where
    L: BackendLauncher + 'static,
    P: HealthProbe + 'static,
{
    let Ok(_gate) = ctx.restart_gate.try_lock() else {
        debug!("restart already in flight; dropping timeout signal");
        return;
    };
    if ctx.shutdown.load(Ordering::SeqCst) {
        return;
    }

    ctx.monitor.stop().await;
    if let Some(old) = ctx.current.lock().await.take() {
        warn!(instance = %old.instance(), "watchdog expired; replacing server instance");
        old.terminate();
    }

    loop {
        if ctx.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let attempt = ctx.restart_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > ctx.config.restart_budget {
            error!(
                attempts = attempt - 1,
                "restart budget exhausted; supervisor giving up"
            );
            let _ = ctx
                .events_tx
                .send(SupervisorEvent::PersistentFailure { attempts: attempt - 1 });
            return;
        }

        match ctx
            .launcher
            .launch(ctx.config.preferred_port, sinks.clone())
            .await
        {
            Ok(server) => {
                let port = server.port();
                let instance = server.instance();
                *ctx.current.lock().await = Some(server);
                ctx.monitor.start(port, instance, health_tx.clone()).await;
                info!(port, %instance, attempt, "server relaunched");
                let _ = ctx
                    .events_tx
                    .send(SupervisorEvent::Restarted { instance, port });
                return;
            }
            Err(err) => {
                warn!(%err, attempt, "relaunch failed");
            }
        }
    }
}
