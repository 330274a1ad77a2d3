use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dem_core::{CoreError, PublishError};

/// Handler error for the ingress endpoints.
///
/// Every variant maps to a bare status code; response bodies stay empty.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No publisher is bound to the requested route.
    #[error("No publisher bound to route '{0}'")]
    UnknownRoute(String),

    /// The request body is not a valid reading.
    #[error("Malformed reading: {0}")]
    Decode(#[source] serde_json::Error),

    /// The reading decoded but cannot be multiplied.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The downstream transport rejected the derived readings.
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            AppError::Decode(_) | AppError::Core(_) => StatusCode::BAD_REQUEST,
            AppError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }
        status.into_response()
    }
}
