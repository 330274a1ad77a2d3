//! Device event multiplier core.
//!
//! Domain types and the seams shared by every other crate in the
//! workspace:
//!
//! - [`Reading`] -- one device telemetry sample.
//! - [`Multiplier`] -- the mutation engine turning one reading into many.
//! - [`Publisher`] -- the delivery capability implemented per transport.
//! - [`Runner`] -- a long-lived task supervised by the service binary.

pub mod config;
pub mod error;
pub mod mutation;
pub mod publisher;
pub mod reading;
pub mod runner;

pub use error::CoreError;
pub use mutation::{MutationPolicy, Multiplier};
pub use publisher::{PublishError, Publisher, PublisherBindings, ROUTE_EVENT_BUS, ROUTE_HTTP};
pub use reading::{DeviceId, Reading};
pub use runner::{Runner, RunnerError, RunnerState};
