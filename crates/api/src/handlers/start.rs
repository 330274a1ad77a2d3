//! Handler for `POST /start/{route}`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use dem_core::Reading;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Decode one reading, multiply it and hand the clones to the route's publisher.
///
/// 400 on a malformed body (nothing is published), 500 when publishing
/// fails, 200 otherwise. All responses have an empty body.
pub async fn start(
    State(state): State<AppState>,
    Path(route): Path<String>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let publisher = state
        .publishers
        .get(&route)
        .ok_or_else(|| AppError::UnknownRoute(route.clone()))?;

    tracing::info!(route = %route, destination = publisher.destination(), "Starting cloning");

    let reading = Reading::from_json(&body).map_err(AppError::Decode)?;
    let derived = state.multiplier.multiply(&reading)?;

    publisher.publish(&derived).await?;

    tracing::debug!(route = %route, published = derived.len(), "Cloning complete");
    Ok(StatusCode::OK)
}
