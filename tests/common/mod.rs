//! Shared fixtures and helpers for supervisor tests

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
