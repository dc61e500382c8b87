//! Health state machine for the backend server
//!
//! Pure decision logic: no timers, no sockets. The monitor service feeds
//! probe outcomes and watchdog ticks in, and this ledger decides which
//! transitions happened and which events must be emitted. Keeping it free
//! of I/O makes every transition table entry directly unit-testable.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Current health of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    /// No probe has completed yet
    Unknown,
    /// The most recently completed probe succeeded
    Healthy,
    /// The last probe failed, but the watchdog window has not elapsed
    Unhealthy,
    /// No probe has succeeded for longer than the watchdog timeout
    TimedOut,
}

/// Transition raised by a probe outcome or a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthTransition {
    BecameHealthy,
    BecameUnhealthy,
    TimedOut,
}

/// Tracks the health state and the watchdog clock for one server instance.
///
/// The watchdog clock (`last_success`) moves only on probe success or an
/// explicit re-arm; probe failures leave it untouched so a burst of fast
/// failures cannot trip the timeout before the window truly elapses.
#[derive(Debug)]
pub struct HealthLedger {
    state: HealthState,
    last_success: Instant,
    watchdog_timeout: Duration,
}

impl HealthLedger {
    pub fn new(watchdog_timeout: Duration, now: Instant) -> Self {
        Self {
            state: HealthState::Unknown,
            last_success: now,
            watchdog_timeout,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Record a completed probe. Returns the transition to announce, if any.
    ///
    /// Success always lands in `Healthy` (re-entering it from `Unhealthy` or
    /// `TimedOut` is the recovery signal collaborators rely on). A failure is
    /// only announced on the `Healthy`/`Unknown` edge, so repeated failures
    /// within one outage produce a single `BecameUnhealthy`.
    pub fn record_probe(&mut self, healthy: bool, now: Instant) -> Option<HealthTransition> {
        if healthy {
            self.last_success = now;
            let was = self.state;
            self.state = HealthState::Healthy;
            (was != HealthState::Healthy).then_some(HealthTransition::BecameHealthy)
        } else {
            match self.state {
                HealthState::Unknown | HealthState::Healthy => {
                    self.state = HealthState::Unhealthy;
                    Some(HealthTransition::BecameUnhealthy)
                }
                HealthState::Unhealthy | HealthState::TimedOut => None,
            }
        }
    }

    /// Evaluate the watchdog window. Independent of probe cadence.
    pub fn check_watchdog(&mut self, now: Instant) -> Option<HealthTransition> {
        if self.state != HealthState::TimedOut
            && now.duration_since(self.last_success) > self.watchdog_timeout
        {
            self.state = HealthState::TimedOut;
            Some(HealthTransition::TimedOut)
        } else {
            None
        }
    }

    /// Re-arm the watchdog without touching the probe state.
    ///
    /// Used when liveness evidence arrives outside the probe path, e.g. the
    /// server wrote a log line while the first probe is still pending.
    pub fn rearm(&mut self, now: Instant) {
        self.last_success = now;
    }
}
