use axum::{routing::post, Router};

use crate::handlers::start;
use crate::state::AppState;

/// Mount `POST /start/{route}`; the route name selects the publisher binding.
pub fn router() -> Router<AppState> {
    Router::new().route("/start/{route}", post(start::start))
}
