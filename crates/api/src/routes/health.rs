use axum::http::StatusCode;
use axum::{routing::get, Router};

use crate::state::AppState;

/// GET /health -- liveness probe, always succeeds.
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// GET /readiness -- readiness probe, always succeeds.
async fn readiness_check() -> StatusCode {
    StatusCode::OK
}

/// Mount the probe routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
}
