//! Event-bus ingress: consume a reading, multiply it, republish the clones.
//!
//! A delivery is acked only after every derived envelope was handed to the
//! producer. Any failure leaves it unacked: the router waits the nack
//! resend delay and nacks it so the broker redelivers. Clones already
//! published before the failure are published again on redelivery; this
//! at-least-once behaviour is accepted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dem_core::{CoreError, Multiplier, Reading, Runner, RunnerError};
use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerError, Delivery, Envelope, MessageConsumer, MessageProducer};

/// Why a single delivery could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Failed to decode reading: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to multiply reading: {0}")]
    Multiply(#[from] CoreError),

    #[error("Failed to encode derived reading: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to publish derived reading: {0}")]
    Publish(#[from] BrokerError),
}

// ---------------------------------------------------------------------------
// EventBusRouter
// ---------------------------------------------------------------------------

pub struct EventBusRouter {
    handler_name: String,
    consumer: Box<dyn MessageConsumer>,
    producer: Arc<dyn MessageProducer>,
    publish_topic: String,
    multiplier: Arc<Multiplier>,
    nack_resend: Duration,
}

impl EventBusRouter {
    pub fn new(
        handler_name: impl Into<String>,
        consumer: Box<dyn MessageConsumer>,
        producer: Arc<dyn MessageProducer>,
        publish_topic: impl Into<String>,
        multiplier: Arc<Multiplier>,
        nack_resend: Duration,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            consumer,
            producer,
            publish_topic: publish_topic.into(),
            multiplier,
            nack_resend,
        }
    }

    /// Decode, multiply and republish one delivery.
    ///
    /// All envelopes are encoded before the first one is sent. Returns the
    /// number of envelopes published.
    async fn process(&self, delivery: &Delivery) -> Result<usize, RouterError> {
        let reading = Reading::from_json(&delivery.payload).map_err(RouterError::Decode)?;
        let derived = self.multiplier.multiply(&reading)?;

        let envelopes = derived
            .iter()
            .map(Envelope::for_reading)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RouterError::Encode)?;

        for envelope in &envelopes {
            self.producer.send(&self.publish_topic, envelope).await?;
        }

        Ok(envelopes.len())
    }

    async fn handle(&self, delivery: Delivery) {
        match self.process(&delivery).await {
            Ok(published) => {
                tracing::debug!(
                    handler = %self.handler_name,
                    offset = delivery.offset,
                    published,
                    "Delivery processed",
                );
                if let Err(e) = self.consumer.ack(&delivery).await {
                    tracing::error!(handler = %self.handler_name, offset = delivery.offset, error = %e, "Failed to ack delivery");
                }
            }
            Err(e) => {
                tracing::error!(
                    handler = %self.handler_name,
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    message_id = delivery.message_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Delivery failed, leaving it unacked for redelivery",
                );
                tokio::time::sleep(self.nack_resend).await;
                if let Err(e) = self.consumer.nack(&delivery).await {
                    tracing::error!(handler = %self.handler_name, offset = delivery.offset, error = %e, "Failed to nack delivery");
                }
            }
        }
    }
}

#[async_trait]
impl Runner for EventBusRouter {
    fn name(&self) -> &str {
        &self.handler_name
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), RunnerError> {
        tracing::info!(
            handler = %self.handler_name,
            publish_topic = %self.publish_topic,
            "Event-bus router started",
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(handler = %self.handler_name, "Event-bus router shutting down");
                    if let Err(e) = self.consumer.close().await {
                        tracing::warn!(handler = %self.handler_name, error = %e, "Failed to close consumer");
                    }
                    return Ok(());
                }
                received = self.consumer.recv() => received,
            };

            match received {
                Ok(delivery) => self.handle(delivery).await,
                Err(BrokerError::Closed) => {
                    return Err(RunnerError::new(self.handler_name.clone(), BrokerError::Closed));
                }
                Err(e) => {
                    tracing::warn!(handler = %self.handler_name, error = %e, "Event-bus receive error");
                    tokio::time::sleep(self.nack_resend).await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
