//! Publishes readings as independent event-bus messages.

use std::sync::Arc;

use async_trait::async_trait;
use dem_core::{PublishError, Publisher, Reading};

use crate::broker::{Envelope, MessageProducer};

/// Sends each reading to a fixed topic with a fresh message identifier.
pub struct BusPublisher {
    producer: Arc<dyn MessageProducer>,
    topic: String,
}

impl BusPublisher {
    pub fn new(producer: Arc<dyn MessageProducer>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Publisher for BusPublisher {
    fn destination(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, readings: &[Reading]) -> Result<(), PublishError> {
        tracing::debug!(topic = %self.topic, count = readings.len(), "Publishing readings to event bus");

        for reading in readings {
            let envelope = Envelope::for_reading(reading)?;
            self.producer
                .send(&self.topic, &envelope)
                .await
                .map_err(|e| PublishError::Transport(e.to_string()))?;
        }

        Ok(())
    }
}
