//! Trait definitions with mockall annotations for testing
//!
//! These are the seams the supervisor is generic over: the liveness probe
//! and the backend launcher. Tests substitute mocks or scripted fakes; the
//! binary wires in the `Real*` implementations from `services`.

use tokio::sync::mpsc;

use crate::error::SupervisorResult;
use crate::events::{ExitNotice, InstanceId, OutputLine};

/// Channels a launched process reports into.
///
/// Unbounded senders so delivery from the reader loops and the exit waiter
/// can never block; the consumer side decides how fast to drain.
#[derive(Debug, Clone)]
pub struct ProcessSinks {
    pub output: mpsc::UnboundedSender<OutputLine>,
    pub exit: mpsc::UnboundedSender<ExitNotice>,
}

/// One liveness check against a server port.
#[mockall::automock]
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    /// `true` on a successful response within the probe timeout; any other
    /// outcome (non-success status, refused connection, timeout) is `false`.
    async fn check(&self, port: u16) -> bool;
}

/// Control surface of a running server instance.
///
/// `terminate` is idempotent, callable from any context, and never blocks;
/// escalation to a forceful kill happens in the background.
#[mockall::automock]
pub trait ServerControl: Send + Sync {
    fn instance(&self) -> InstanceId;
    fn port(&self) -> u16;
    fn pid(&self) -> Option<u32>;
    fn terminate(&self);
}

/// Launches one backend server process per call.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BackendLauncher: Send + Sync {
    /// Spawn a fresh server instance. The preferred port is used when free;
    /// otherwise an ephemeral port is bound and reported via the returned
    /// control handle.
    async fn launch(
        &self,
        preferred_port: u16,
        sinks: ProcessSinks,
    ) -> SupervisorResult<Box<dyn ServerControl>>;
}
