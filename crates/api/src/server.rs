//! HTTP ingress as a supervised [`Runner`].

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use dem_core::{Runner, RunnerError};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

const RUNNER_NAME: &str = "http-server";

/// Serves the ingress router until cancelled, then drains in-flight
/// requests for at most `shutdown_grace`.
///
/// Connections still open after the grace period are no longer awaited;
/// their tasks are dropped when the runtime shuts down.
pub struct HttpServer {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    app: Router,
    shutdown_grace: Duration,
}

impl HttpServer {
    /// Bind the listener eagerly so port conflicts surface at startup.
    pub async fn bind(config: &ServerConfig, app: Router) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            app,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Runner for HttpServer {
    fn name(&self) -> &str {
        RUNNER_NAME
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), RunnerError> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| RunnerError::new(RUNNER_NAME, "listener already consumed"))?;

        tracing::info!(addr = %self.local_addr, "Starting HTTP server");

        let server = axum::serve(listener, self.app.clone())
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .into_future();
        let mut server = std::pin::pin!(server);

        tokio::select! {
            result = &mut server => {
                return result.map_err(|e| RunnerError::new(RUNNER_NAME, e));
            }
            () = cancel.cancelled() => {
                tracing::info!(
                    grace_secs = self.shutdown_grace.as_secs(),
                    "Shutting down HTTP server, draining in-flight requests",
                );
            }
        }

        match tokio::time::timeout(self.shutdown_grace, server).await {
            Ok(result) => {
                result.map_err(|e| RunnerError::new(RUNNER_NAME, e))?;
                tracing::info!("HTTP server stopped");
            }
            Err(_) => {
                tracing::warn!("Shutdown grace period elapsed, abandoning in-flight requests");
            }
        }
        Ok(())
    }
}
