//! Delivery capability shared by every downstream transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::reading::Reading;

/// Route key binding the HTTP publisher.
pub const ROUTE_HTTP: &str = "http";

/// Route key binding the event-bus publisher.
pub const ROUTE_EVENT_BUS: &str = "event-bus";

/// Failure to hand a reading to the downstream transport.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The reading could not be encoded.
    #[error("Failed to serialize reading: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Network or broker failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The HTTP sink answered with a status outside the accepted set.
    #[error("Sink returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Sends a batch of readings to one configured destination.
///
/// Implementations emit one outbound operation per reading, in slice order,
/// and stop at the first failure. Readings sent before the failure stay
/// delivered.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short destination description for logs (topic or URL).
    fn destination(&self) -> &str;

    async fn publish(&self, readings: &[Reading]) -> Result<(), PublishError>;
}

/// Route name → publisher, built once at startup and read-only afterwards.
pub type PublisherBindings = BTreeMap<String, Arc<dyn Publisher>>;
