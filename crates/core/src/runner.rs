//! Long-lived tasks supervised by the service binary.
//!
//! A [`Runner`] blocks in [`run`](Runner::run) until its cancellation token
//! fires (clean stop) or it hits an unrecoverable failure (error). Runners
//! are never restarted.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Boxed error carried by [`RunnerError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle of one supervised runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Running,
    Stopped,
    Failed,
}

impl RunnerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// Unrecoverable runner failure.
#[derive(Debug, thiserror::Error)]
#[error("Runner '{runner}' failed: {source}")]
pub struct RunnerError {
    pub runner: String,
    #[source]
    pub source: BoxError,
}

impl RunnerError {
    pub fn new(runner: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            runner: runner.into(),
            source: source.into(),
        }
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Run until `cancel` fires or a fatal error occurs.
    ///
    /// Implementations must observe cancellation promptly and finish
    /// in-flight work within their own grace period.
    async fn run(&self, cancel: CancellationToken) -> Result<(), RunnerError>;
}
