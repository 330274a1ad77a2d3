//! Event-bus routing configuration.

use std::str::FromStr;
use std::time::Duration;

use dem_core::config::{env_parse, env_string, ConfigError};
use validator::Validate;

/// Which broker client backs the event-bus transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    Kafka,
    /// In-process broker; nothing leaves the process.
    Memory,
}

impl FromStr for BrokerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kafka" => Ok(Self::Kafka),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown broker backend '{other}' (expected kafka or memory)")),
        }
    }
}

/// Topics, consumer group and pacing of the event-bus ingress router.
#[derive(Debug, Clone, Validate)]
pub struct PubSubConfig {
    pub backend: BrokerBackend,
    #[validate(length(min = 1))]
    pub subscribe_topic: String,
    #[validate(length(min = 1))]
    pub publish_topic: String,
    #[validate(length(min = 1))]
    pub handler_name: String,
    #[validate(length(min = 1))]
    pub group_name: String,
    /// Pause before a failed delivery is nacked for redelivery.
    pub nack_resend: Duration,
}

impl PubSubConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `PUB_SUB_BACKEND`              | `kafka`                    |
    /// | `PUB_SUB_SUBSCRIBE_TOPIC`      | `device_data_test`         |
    /// | `PUB_SUB_PUBLISH_TOPIC`        | `device_data`              |
    /// | `PUB_SUB_HANDLER_NAME`         | `device_data_handler`      |
    /// | `PUB_SUB_SUBSCRIBE_GROUP_NAME` | `device_data_tester_group` |
    /// | `PUB_SUB_NACK_RESEND_MILLIS`   | `100`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            backend: env_parse("PUB_SUB_BACKEND", BrokerBackend::Kafka)?,
            subscribe_topic: env_string("PUB_SUB_SUBSCRIBE_TOPIC", "device_data_test"),
            publish_topic: env_string("PUB_SUB_PUBLISH_TOPIC", "device_data"),
            handler_name: env_string("PUB_SUB_HANDLER_NAME", "device_data_handler"),
            group_name: env_string("PUB_SUB_SUBSCRIBE_GROUP_NAME", "device_data_tester_group"),
            nack_resend: Duration::from_millis(env_parse("PUB_SUB_NACK_RESEND_MILLIS", 100)?),
        };
        config.validate()?;
        Ok(config)
    }
}
