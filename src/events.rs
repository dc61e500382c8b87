//! Typed events crossing the supervisor boundary
//!
//! Observers (the shell UI, tests) subscribe to `SupervisorEvent`; internal
//! collaborators exchange the narrower `HealthEvent`, `OutputLine` and
//! `ExitNotice` over channels so event production never re-enters the
//! consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::HealthTransition;

/// Identity of one launched server process.
///
/// A fresh id is minted per launch so observers can discard events that
/// belong to an instance the supervisor has already replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which standard stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// One decoded line of child process output.
///
/// Lines within one stream preserve arrival order; stdout and stderr are not
/// ordered relative to each other.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

/// Exactly-once notification that a child process is gone.
#[derive(Debug, Clone, Copy)]
pub struct ExitNotice {
    pub pid: u32,
    /// Exit code; `None` when the process died from a signal.
    pub code: Option<i32>,
    /// Whether `terminate()` had been requested before the exit.
    pub requested: bool,
}

/// A health transition observed against a specific server instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub instance: InstanceId,
    pub transition: HealthTransition,
    pub at: DateTime<Utc>,
}

impl HealthEvent {
    pub fn now(instance: InstanceId, transition: HealthTransition) -> Self {
        Self {
            instance,
            transition,
            at: Utc::now(),
        }
    }
}

/// Everything the supervisor reports to its registered observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupervisorEvent {
    /// Advisory health transition, forwarded as-is
    Health(HealthEvent),
    /// The server process exited (deduplicated; `requested` distinguishes a
    /// deliberate shutdown from a crash)
    ServerExited {
        pid: u32,
        code: Option<i32>,
        requested: bool,
    },
    /// A watchdog-driven restart completed and a new instance is live
    Restarted { instance: InstanceId, port: u16 },
    /// The restart budget is exhausted; the supervisor gave up until the
    /// next explicit `start()`
    PersistentFailure { attempts: u32 },
}
