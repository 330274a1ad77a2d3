//! Process wiring for the device event multiplier.
//!
//! Configuration loading, the runner supervisor, OS signal handling and the
//! receiver mock live here so both binaries stay thin.

pub mod config;
pub mod receiver;
pub mod signal;
pub mod supervisor;
pub mod telemetry;
