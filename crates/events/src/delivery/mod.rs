//! Downstream delivery channels.
//!
//! Both implement [`Publisher`](dem_core::Publisher): one outbound operation
//! per reading, stopping at the first failure.

pub mod bus;
pub mod http;
