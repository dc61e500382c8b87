//! Service implementations
//!
//! Real implementations that handle actual I/O: process spawning and
//! draining, port selection, HTTP probing, and the periodic monitor tasks.

pub mod admin_task;
pub mod child_process;
pub mod health_monitor;
pub mod probe;
pub mod server_process;

#[cfg(test)]
mod tests;

// Re-export the service types callers wire together
pub use admin_task::AdminTask;
pub use child_process::ChildProcessHandle;
pub use health_monitor::HealthMonitor;
pub use probe::HttpHealthProbe;
pub use server_process::{BackendServerProcess, RealBackendLauncher};
