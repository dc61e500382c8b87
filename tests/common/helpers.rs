//! Scripted launcher, server, and probe doubles plus event-stream helpers.
//!
//! The mockall mocks in the crate cover call-expectation tests; the doubles
//! here additionally model launch latency and shared counters, which the
//! supervisor restart tests need.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use supervisor::{
    BackendLauncher, HealthProbe, InstanceId, ProcessSinks, ServerControl, SupervisorError,
    SupervisorEvent, SupervisorResult,
};

/// Server handle that records how many times it was asked to terminate.
pub struct TestServer {
    instance: InstanceId,
    port: u16,
    terminations: Arc<AtomicU32>,
}

impl ServerControl for TestServer {
    fn instance(&self) -> InstanceId {
        self.instance
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Launcher double that hands out [`TestServer`]s and keeps shared counters
/// so tests can assert on launch and termination totals after the supervisor
/// has consumed the launcher.
pub struct TestLauncher {
    launches: Arc<AtomicU32>,
    terminations: Arc<AtomicU32>,
    instances: Arc<Mutex<Vec<InstanceId>>>,
    fail_first: u32,
    delay: Duration,
    delay_from_launch: u32,
}

impl TestLauncher {
    pub fn new() -> Self {
        Self {
            launches: Arc::new(AtomicU32::new(0)),
            terminations: Arc::new(AtomicU32::new(0)),
            instances: Arc::new(Mutex::new(Vec::new())),
            fail_first: 0,
            delay: Duration::ZERO,
            delay_from_launch: u32::MAX,
        }
    }

    /// Fail the first `n` launch attempts before succeeding.
    pub fn fail_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Sleep `delay` inside every launch starting with launch number `from`
    /// (1-based). Used to hold a restart in flight while stop() races it.
    pub fn delay_from(mut self, from: u32, delay: Duration) -> Self {
        self.delay_from_launch = from;
        self.delay = delay;
        self
    }

    /// Counter handles that stay valid after the launcher moves into the
    /// supervisor: (launches, terminations, instances).
    pub fn handles(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>, Arc<Mutex<Vec<InstanceId>>>) {
        (
            Arc::clone(&self.launches),
            Arc::clone(&self.terminations),
            Arc::clone(&self.instances),
        )
    }
}

#[async_trait]
impl BackendLauncher for TestLauncher {
    async fn launch(
        &self,
        preferred_port: u16,
        _sinks: ProcessSinks,
    ) -> SupervisorResult<Box<dyn ServerControl>> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.delay_from_launch {
            tokio::time::sleep(self.delay).await;
        }
        if n <= self.fail_first {
            return Err(SupervisorError::NoAvailablePort {
                preferred: preferred_port,
            });
        }
        let instance = InstanceId::new();
        self.instances.lock().unwrap().push(instance);
        Ok(Box::new(TestServer {
            instance,
            port: preferred_port,
            terminations: Arc::clone(&self.terminations),
        }))
    }
}

/// Probe whose verdict is a function of the call number (0-based).
pub struct ScriptedProbe {
    calls: AtomicUsize,
    script: Box<dyn Fn(usize) -> bool + Send + Sync>,
}

impl ScriptedProbe {
    pub fn new(script: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Box::new(script),
        }
    }

    pub fn always_up() -> Self {
        Self::new(|_| true)
    }

    pub fn always_down() -> Self {
        Self::new(|_| false)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self, _port: u16) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(n)
    }
}

/// Receive the next broadcast event, failing the test if none arrives.
pub async fn next_event(
    rx: &mut tokio::sync::broadcast::Receiver<SupervisorEvent>,
) -> SupervisorEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for a supervisor event")
        .expect("event channel closed")
}

/// Skip events until one matches the predicate, returning it.
pub async fn wait_for(
    rx: &mut tokio::sync::broadcast::Receiver<SupervisorEvent>,
    pred: impl Fn(&SupervisorEvent) -> bool,
) -> SupervisorEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Assert that no further events arrive within the given window.
pub async fn assert_silent(
    rx: &mut tokio::sync::broadcast::Receiver<SupervisorEvent>,
    window: Duration,
) {
    tokio::time::sleep(window).await;
    match rx.try_recv() {
        Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {}
        other => panic!("expected a quiet event stream, got {other:?}"),
    }
}
