use std::sync::Arc;

use dem_core::{Multiplier, PublisherBindings};

/// Shared state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; both fields are immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Mutation engine shared with the event-bus router.
    pub multiplier: Arc<Multiplier>,
    /// Route name → publisher.
    pub publishers: Arc<PublisherBindings>,
}
