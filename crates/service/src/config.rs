use dem_api::config::ServerConfig;
use dem_core::config::{env_parse, env_string, ConfigError};
use dem_core::MutationPolicy;
use dem_events::{HttpPublisherConfig, KafkaConfig, PubSubConfig};

/// Everything the multiplier process reads from its environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub policy: MutationPolicy,
    pub server: ServerConfig,
    pub http_publisher: HttpPublisherConfig,
    pub kafka: KafkaConfig,
    pub pub_sub: PubSubConfig,
}

impl ServiceConfig {
    /// Load and validate every section; the first invalid value aborts.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            policy: MutationPolicy::from_env()?,
            server: ServerConfig::from_env()?,
            http_publisher: HttpPublisherConfig::from_env()?,
            kafka: KafkaConfig::from_env()?,
            pub_sub: PubSubConfig::from_env()?,
        })
    }
}

/// Settings of the `receiver-mock` binary.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub server: ServerConfig,
    pub topic: String,
    pub group_name: String,
    pub kafka: KafkaConfig,
}

impl ReceiverConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var               | Default                    |
    /// |-----------------------|----------------------------|
    /// | `RECEIVER_HTTP_PORT`  | `8081`                     |
    /// | `RECEIVER_TOPIC`      | `device_data`              |
    /// | `RECEIVER_GROUP_NAME` | `device_data_reader_group` |
    ///
    /// The listener binds `0.0.0.0`; `KAFKA_ADDR` is shared with the
    /// multiplier.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ServerConfig::from_env()?;
        Ok(Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: env_parse("RECEIVER_HTTP_PORT", 8081)?,
                ..defaults
            },
            topic: env_string("RECEIVER_TOPIC", "device_data"),
            group_name: env_string("RECEIVER_GROUP_NAME", "device_data_reader_group"),
            kafka: KafkaConfig::from_env()?,
        })
    }
}
