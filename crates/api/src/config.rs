use std::time::Duration;

use dem_core::config::{env_parse, env_string, ConfigError};

/// HTTP listener configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Per-request timeout covering body read and handling (default: 10 s).
    pub request_timeout: Duration,
    /// How long in-flight requests may run after shutdown starts (default: 10 s).
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default   |
    /// |-----------------------------|-----------|
    /// | `HTTP_HOST`                 | `0.0.0.0` |
    /// | `HTTP_PORT`                 | `8080`    |
    /// | `HTTP_REQUEST_TIMEOUT_SECS` | `10`      |
    /// | `HTTP_SHUTDOWN_GRACE_SECS`  | `10`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("HTTP_HOST", "0.0.0.0"),
            port: env_parse("HTTP_PORT", 8080)?,
            request_timeout: Duration::from_secs(env_parse("HTTP_REQUEST_TIMEOUT_SECS", 10)?),
            shutdown_grace: Duration::from_secs(env_parse("HTTP_SHUTDOWN_GRACE_SECS", 10)?),
        })
    }

    /// Socket address string for [`tokio::net::TcpListener::bind`].
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
