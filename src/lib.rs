//! Backend server supervision library
//!
//! Launches a local backend server as a child process, keeps probing it for
//! liveness, and restarts it when it crashes or stops answering. The
//! composition root (`Supervisor`) is generic over the launcher and probe
//! seams so the restart machinery is testable without real processes.

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod logging;
pub mod services;
pub mod supervisor;
pub mod traits;

// Re-export commonly used types
pub use config::{BackendPaths, MonitorConfig, SupervisorConfig};
pub use core::{HealthLedger, HealthState, HealthTransition};
pub use error::{SupervisorError, SupervisorResult};
pub use events::{ExitNotice, HealthEvent, InstanceId, OutputLine, OutputStream, SupervisorEvent};
pub use supervisor::Supervisor;
pub use traits::{
    BackendLauncher, HealthProbe, MockBackendLauncher, MockHealthProbe, MockServerControl,
    ProcessSinks, ServerControl,
};
