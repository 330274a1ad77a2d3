//! Event-bus plumbing and downstream delivery.
//!
//! - [`broker`] -- the producer/consumer seam over the message broker.
//! - [`kafka`] -- rdkafka-backed broker client.
//! - [`memory`] -- in-process broker for broker-less runs and tests.
//! - [`delivery`] -- the event-bus and HTTP [`Publisher`](dem_core::Publisher)s.
//! - [`router`] -- event-bus ingress that multiplies and republishes each delivery.

pub mod broker;
pub mod config;
pub mod delivery;
pub mod kafka;
pub mod memory;
pub mod router;

pub use broker::{BrokerError, Delivery, Envelope, MessageConsumer, MessageProducer};
pub use config::{BrokerBackend, PubSubConfig};
pub use delivery::bus::BusPublisher;
pub use delivery::http::{HttpPublisher, HttpPublisherConfig};
pub use kafka::{KafkaConfig, KafkaConsumer, KafkaProducer};
pub use memory::{MemoryBroker, MemoryConsumer};
pub use router::{EventBusRouter, RouterError};
