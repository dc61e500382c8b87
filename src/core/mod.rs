//! Pure domain logic, kept free of timers and I/O

pub mod health;

pub use health::{HealthLedger, HealthState, HealthTransition};
