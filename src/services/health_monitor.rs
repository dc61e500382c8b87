//! Health monitor: probe loop and watchdog loop
//!
//! Two independent periodic tasks share one `HealthLedger`. The probe task
//! completes a liveness check each interval; the watchdog task compares the
//! elapsed time since the last success to the timeout window. Emitting
//! events while the ledger lock is held gives a total order per monitor:
//! an event is delivered exactly in the order its triggering check settled
//! the state machine.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::MonitorConfig;
use crate::core::HealthLedger;
use crate::events::{HealthEvent, InstanceId};
use crate::traits::HealthProbe;

pub struct HealthMonitor<P> {
    config: MonitorConfig,
    probe: Arc<P>,
    ledger: Mutex<Option<Arc<Mutex<HealthLedger>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: HealthProbe + 'static> HealthMonitor<P> {
    pub fn new(config: MonitorConfig, probe: Arc<P>) -> Self {
        Self {
            config,
            probe,
            ledger: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// (Re)start monitoring against `port`.
    ///
    /// Re-initializes the watchdog clock to "now" and begins both periodic
    /// activities; the first probe fires one full interval from now, so a
    /// just-launched server is not failed at t=0.
    pub async fn start(&self, port: u16, instance: InstanceId, events: mpsc::UnboundedSender<HealthEvent>) {
        self.stop().await;

        let ledger = Arc::new(Mutex::new(HealthLedger::new(
            self.config.watchdog_timeout(),
            Instant::now(),
        )));
        *self.ledger.lock().await = Some(Arc::clone(&ledger));

        let probe_interval = self.config.probe_interval();
        let probe_timeout = self.config.probe_timeout();

        // Probe task: one bounded liveness request per interval. The
        // per-request timeout sits strictly below the interval, so probes
        // never overlap.
        let probe = Arc::clone(&self.probe);
        let probe_ledger = Arc::clone(&ledger);
        let probe_events = events.clone();
        let probe_task = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + probe_interval, probe_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let healthy = tokio::time::timeout(probe_timeout, probe.check(port))
                    .await
                    .unwrap_or(false);
                let mut ledger = probe_ledger.lock().await;
                if let Some(transition) = ledger.record_probe(healthy, Instant::now()) {
                    let _ = probe_events.send(HealthEvent::now(instance, transition));
                }
            }
        });

        // Watchdog task: same cadence, independent clock. A slow or failing
        // probe never fires the timeout by itself; only elapsed time since
        // the last success does.
        let watchdog_ledger = Arc::clone(&ledger);
        let watchdog_task = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + probe_interval, probe_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let mut ledger = watchdog_ledger.lock().await;
                if let Some(transition) = ledger.check_watchdog(Instant::now()) {
                    let _ = events.send(HealthEvent::now(instance, transition));
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(probe_task);
        tasks.push(watchdog_task);
        debug!(port, %instance, "health monitor started");
    }

    /// Re-arm the watchdog without disturbing the probe schedule.
    ///
    /// Called when liveness evidence arrives outside the probe path (e.g.
    /// server output observed), so a slow first boot cannot trip a spurious
    /// timeout while the first probe is still pending.
    pub async fn reset_timeout(&self) {
        if let Some(ledger) = self.ledger.lock().await.as_ref() {
            ledger.lock().await.rearm(Instant::now());
        }
    }

    /// Cancel both periodic activities. In-flight work is abandoned, not
    /// awaited; a probe result landing after stop is discarded.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        *self.ledger.lock().await = None;
    }
}
