//! In-process broker.
//!
//! [`MemoryBroker`] keeps an append-only log per topic and fans every
//! published envelope out to the topic's current subscribers, each of which
//! holds its own unbounded queue. Acks and nacks are recorded so callers can
//! inspect delivery outcomes. It is shared via `Arc<MemoryBroker>`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::broker::{BrokerError, Delivery, Envelope, MessageConsumer, MessageProducer};

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TopicLog {
    messages: Vec<Envelope>,
    subscribers: Vec<mpsc::UnboundedSender<Delivery>>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, TopicLog>,
    acked: Vec<Delivery>,
    nacked: Vec<Delivery>,
}

#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to every envelope published on `topic` from now on.
    pub fn subscribe(self: &Arc<Self>, topic: &str) -> MemoryConsumer {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state()
            .topics
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(tx);

        MemoryConsumer {
            broker: Arc::clone(self),
            rx: tokio::sync::Mutex::new(rx),
            redeliveries: Mutex::new(VecDeque::new()),
        }
    }

    /// Drop all subscriptions; consumers observe [`BrokerError::Closed`]
    /// once their queues drain.
    pub fn close(&self) {
        for log in self.state().topics.values_mut() {
            log.subscribers.clear();
        }
    }

    /// Every envelope published on `topic`, in publish order.
    pub fn messages(&self, topic: &str) -> Vec<Envelope> {
        self.state()
            .topics
            .get(topic)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    pub fn acked(&self) -> Vec<Delivery> {
        self.state().acked.clone()
    }

    pub fn nacked(&self) -> Vec<Delivery> {
        self.state().nacked.clone()
    }
}

#[async_trait]
impl MessageProducer for MemoryBroker {
    async fn send(&self, topic: &str, envelope: &Envelope) -> Result<(), BrokerError> {
        let mut state = self.state();
        let log = state.topics.entry(topic.to_string()).or_default();

        let delivery = Delivery {
            topic: topic.to_string(),
            partition: 0,
            offset: log.messages.len() as i64,
            message_id: Some(envelope.id.to_string()),
            payload: envelope.payload.clone(),
        };
        log.messages.push(envelope.clone());

        // Subscribers whose consumer was dropped are pruned.
        log.subscribers
            .retain(|subscriber| subscriber.send(delivery.clone()).is_ok());

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryConsumer
// ---------------------------------------------------------------------------

/// One subscription on a [`MemoryBroker`] topic.
///
/// Nacked deliveries are queued ahead of new ones.
pub struct MemoryConsumer {
    broker: Arc<MemoryBroker>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
    redeliveries: Mutex<VecDeque<Delivery>>,
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn recv(&self) -> Result<Delivery, BrokerError> {
        let redelivery = self
            .redeliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(delivery) = redelivery {
            return Ok(delivery);
        }

        self.rx.lock().await.recv().await.ok_or(BrokerError::Closed)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.broker.state().acked.push(delivery.clone());
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.broker.state().nacked.push(delivery.clone());
        self.redeliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(delivery.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let broker = Arc::new(MemoryBroker::new());
        let consumer = broker.subscribe("readings");

        let envelope = Envelope::new(b"payload".to_vec());
        broker.send("readings", &envelope).await.unwrap();

        let delivery = consumer.recv().await.expect("should receive the envelope");
        assert_eq!(delivery.topic, "readings");
        assert_eq!(delivery.offset, 0);
        assert_eq!(delivery.payload, b"payload");
        assert_eq!(delivery.message_id, Some(envelope.id.to_string()));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_envelope() {
        let broker = Arc::new(MemoryBroker::new());
        let c1 = broker.subscribe("t");
        let c2 = broker.subscribe("t");

        broker.send("t", &Envelope::new(b"x".to_vec())).await.unwrap();

        assert_eq!(c1.recv().await.unwrap().payload, b"x");
        assert_eq!(c2.recv().await.unwrap().payload, b"x");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_logged() {
        let broker = MemoryBroker::new();
        broker.send("orphan", &Envelope::new(vec![1])).await.unwrap();
        broker.send("orphan", &Envelope::new(vec![2])).await.unwrap();

        let messages = broker.messages("orphan");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].payload, vec![2]);
        assert!(broker.messages("unknown").is_empty());
    }

    #[tokio::test]
    async fn nacked_delivery_is_received_again_first() {
        let broker = Arc::new(MemoryBroker::new());
        let consumer = broker.subscribe("t");
        broker.send("t", &Envelope::new(b"first".to_vec())).await.unwrap();
        broker.send("t", &Envelope::new(b"second".to_vec())).await.unwrap();

        let first = consumer.recv().await.unwrap();
        consumer.nack(&first).await.unwrap();

        assert_eq!(consumer.recv().await.unwrap(), first);
        assert_eq!(consumer.recv().await.unwrap().payload, b"second");
        assert_eq!(broker.nacked(), vec![first]);
        assert!(broker.acked().is_empty());
    }

    #[tokio::test]
    async fn ack_is_recorded() {
        let broker = Arc::new(MemoryBroker::new());
        let consumer = broker.subscribe("t");
        broker.send("t", &Envelope::new(b"x".to_vec())).await.unwrap();

        let delivery = consumer.recv().await.unwrap();
        consumer.ack(&delivery).await.unwrap();

        assert_eq!(broker.acked(), vec![delivery]);
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let broker = Arc::new(MemoryBroker::new());
        let consumer = broker.subscribe("t");
        broker.close();

        assert_matches!(consumer.recv().await, Err(BrokerError::Closed));
    }
}
