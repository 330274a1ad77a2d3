//! Kafka broker client built on rdkafka.
//!
//! The consumer runs with auto-commit disabled: a delivery's offset is
//! committed only when the router acks it, and a nack seeks the partition
//! back to the delivery so it is consumed again.
//!
//! Acks commit asynchronously. The offsets acked so far are committed once
//! more, synchronously, when the consumer is closed, so a clean shutdown
//! does not replay already processed deliveries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dem_core::config::{env_parse, env_string, ConfigError};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};

use crate::broker::{BrokerError, Delivery, Envelope, MessageConsumer, MessageProducer, MESSAGE_ID_HEADER};

/// Bound on the blocking seek issued by a nack.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` list.
    pub brokers: String,
    /// Delivery timeout of a single produced message.
    pub produce_timeout: Duration,
}

impl KafkaConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                          | Default      |
    /// |----------------------------------|--------------|
    /// | `KAFKA_ADDR`                     | `kafka:9092` |
    /// | `PUB_SUB_PRODUCE_TIMEOUT_MILLIS` | `5000`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            brokers: env_string("KAFKA_ADDR", "kafka:9092"),
            produce_timeout: Duration::from_millis(env_parse("PUB_SUB_PRODUCE_TIMEOUT_MILLIS", 5000)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub struct KafkaProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set(
                "message.timeout.ms",
                config.produce_timeout.as_millis().to_string(),
            )
            .create()?;

        tracing::info!(brokers = %config.brokers, "Kafka producer created");

        Ok(Self {
            producer,
            timeout: config.produce_timeout,
        })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, topic: &str, envelope: &Envelope) -> Result<(), BrokerError> {
        let id = envelope.id.to_string();
        let record = FutureRecord::<(), _>::to(topic)
            .payload(&envelope.payload)
            .headers(OwnedHeaders::new().insert(Header {
                key: MESSAGE_ID_HEADER,
                value: Some(id.as_str()),
            }));

        self.producer
            .send(record, self.timeout)
            .await
            .map(|_| ())
            .map_err(|(e, _)| BrokerError::Kafka(e))
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
    /// Next offset to commit per (topic, partition), as of the latest ack.
    acked: Mutex<HashMap<(String, i32), i64>>,
}

impl KafkaConsumer {
    /// Join `group` and subscribe to `topic`, starting from the oldest
    /// offset when the group has no committed position.
    pub fn subscribe(config: &KafkaConfig, group: &str, topic: &str) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[topic])?;

        tracing::info!(brokers = %config.brokers, group, topic, "Kafka consumer subscribed");

        Ok(Self {
            consumer: Arc::new(consumer),
            acked: Mutex::new(HashMap::new()),
        })
    }

    fn acked_offsets(&self) -> KafkaResult<TopicPartitionList> {
        let acked = self.acked.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in acked.iter() {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(*offset))?;
        }
        Ok(tpl)
    }
}

/// Run a blocking rdkafka call on the blocking pool.
async fn off_runtime<T, F>(call: F) -> Result<T, BrokerError>
where
    F: FnOnce() -> KafkaResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(call).await??)
}

#[async_trait]
impl MessageConsumer for KafkaConsumer {
    async fn recv(&self) -> Result<Delivery, BrokerError> {
        let message = self.consumer.recv().await?;

        let message_id = message.headers().and_then(|headers| {
            headers
                .iter()
                .find(|header| header.key == MESSAGE_ID_HEADER)
                .and_then(|header| header.value)
                .map(|value| String::from_utf8_lossy(value).into_owned())
        });

        Ok(Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            message_id,
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let next = delivery.offset + 1;
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&delivery.topic, delivery.partition, Offset::Offset(next))?;
        self.consumer.commit(&tpl, CommitMode::Async)?;

        self.acked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((delivery.topic.clone(), delivery.partition), next);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = delivery.topic.clone();
        let (partition, offset) = (delivery.partition, delivery.offset);

        off_runtime(move || {
            consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
        })
        .await
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let tpl = self.acked_offsets()?;
        if tpl.count() == 0 {
            return Ok(());
        }

        let consumer = Arc::clone(&self.consumer);
        off_runtime(move || consumer.commit(&tpl, CommitMode::Sync)).await?;
        tracing::info!("Kafka consumer committed acked offsets on close");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use rdkafka::error::KafkaError;

    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_calls_leave_the_runtime_free() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        });

        off_runtime(|| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 5);
        ticker.abort();
    }

    #[tokio::test]
    async fn blocking_call_errors_are_kafka_errors() {
        let result = off_runtime(|| Err::<(), _>(KafkaError::Seek("not assigned".into()))).await;

        assert_matches!(result, Err(BrokerError::Kafka(KafkaError::Seek(_))));
    }
}
