//! Publishes readings as individual HTTP POST requests.
//!
//! [`HttpPublisher`] sends each JSON-encoded [`Reading`] to a fixed URL.
//! Only 200, 201 and 202 count as accepted; any other status aborts the
//! remaining batch. There is no retry.

use std::time::Duration;

use async_trait::async_trait;
use dem_core::config::{env_parse, env_string, ConfigError};
use dem_core::{PublishError, Publisher, Reading};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use validator::Validate;

/// Content type declared on every outbound request.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Statuses treated as a successful hand-off.
const ACCEPTED_STATUSES: [StatusCode; 3] = [StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Validate)]
pub struct HttpPublisherConfig {
    /// Target URL receiving one POST per reading.
    #[validate(url)]
    pub url: String,
    /// Timeout of a single request.
    pub timeout: Duration,
    /// Skip TLS certificate verification on the target.
    pub insecure_skip_verify: bool,
}

impl HttpPublisherConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                     | Default                             |
    /// |-----------------------------|-------------------------------------|
    /// | `HTTP_PUBLISH_PATH`         | `http://receiver-mock:8081/process` |
    /// | `HTTP_MILLISECOND_TIMEOUT`  | `1500`                              |
    /// | `HTTP_INSECURE_SKIP_VERIFY` | `true`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            url: env_string("HTTP_PUBLISH_PATH", "http://receiver-mock:8081/process"),
            timeout: Duration::from_millis(env_parse("HTTP_MILLISECOND_TIMEOUT", 1500)?),
            insecure_skip_verify: env_parse("HTTP_INSECURE_SKIP_VERIFY", true)?,
        };
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// HttpPublisher
// ---------------------------------------------------------------------------

pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub fn new(config: &HttpPublisherConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Execute a single POST and check the response status.
    async fn try_send(&self, body: Vec<u8>) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !ACCEPTED_STATUSES.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn destination(&self) -> &str {
        &self.url
    }

    async fn publish(&self, readings: &[Reading]) -> Result<(), PublishError> {
        tracing::info!(url = %self.url, count = readings.len(), "Publishing readings over HTTP");

        for reading in readings {
            let body = reading.to_json()?;
            if let Err(e) = self.try_send(body).await {
                tracing::warn!(url = %self.url, timestamp = reading.timestamp, error = %e, "HTTP publish failed");
                return Err(e);
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
