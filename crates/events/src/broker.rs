//! Producer/consumer seam over the message broker.
//!
//! The router and the event-bus publisher only see these traits, so the
//! same pipeline runs against Kafka in production and against the
//! in-process [`MemoryBroker`](crate::memory::MemoryBroker) in tests.

use async_trait::async_trait;
use dem_core::Reading;
use uuid::Uuid;

/// Header carrying the outbound message identifier.
pub const MESSAGE_ID_HEADER: &str = "message_uuid";

/// Broker client failure.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A blocking broker call could not run to completion.
    #[error("Blocking broker call failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The subscription ended; no further deliveries will arrive.
    #[error("Subscription closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// One outbound message: a fresh identifier and an encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: Uuid,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wrap `payload` with a freshly generated identifier.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }

    /// Encode `reading` as JSON into a new envelope.
    pub fn for_reading(reading: &Reading) -> Result<Self, serde_json::Error> {
        Ok(Self::new(reading.to_json()?))
    }
}

/// One inbound message together with the position needed to ack or nack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub message_id: Option<String>,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Hand one envelope to the broker for `topic`.
    async fn send(&self, topic: &str, envelope: &Envelope) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait for the next delivery.
    ///
    /// [`BrokerError::Closed`] is terminal; other errors are transient.
    async fn recv(&self) -> Result<Delivery, BrokerError>;

    /// Mark `delivery` as processed so it is not delivered again.
    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Rewind so `delivery` is received again.
    async fn nack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Flush outstanding acks before the consumer is dropped.
    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
