//! HTTP ingress adapter.
//!
//! Exposes the building blocks (config, state, error mapping, routes and
//! the graceful-shutdown server runner) so integration tests and the
//! service binary share the exact same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod server;
pub mod state;
