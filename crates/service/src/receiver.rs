//! Downstream test receiver: counts what the multiplier delivers.
//!
//! The HTTP side accepts `POST /process`; the event-bus side consumes and
//! acks every message on its topic. Both share one [`ReceiverCounters`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use dem_core::{Runner, RunnerError};
use dem_events::{BrokerError, MessageConsumer};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Debug, Default)]
pub struct ReceiverCounters {
    http: AtomicU64,
    bus: AtomicU64,
}

impl ReceiverCounters {
    pub fn http(&self) -> u64 {
        self.http.load(Ordering::Relaxed)
    }

    pub fn bus(&self) -> u64 {
        self.bus.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.http() + self.bus()
    }
}

// ---------------------------------------------------------------------------
// HTTP side
// ---------------------------------------------------------------------------

/// Router exposing `POST /process`.
pub fn http_router(counters: Arc<ReceiverCounters>) -> Router {
    Router::new()
        .route("/process", post(process))
        .layer(TraceLayer::new_for_http())
        .with_state(counters)
}

async fn process(State(counters): State<Arc<ReceiverCounters>>, body: Bytes) -> StatusCode {
    let count = counters.http.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(count, body = %String::from_utf8_lossy(&body), "Received HTTP message");
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Event-bus side
// ---------------------------------------------------------------------------

pub struct BusReceiver {
    consumer: Box<dyn MessageConsumer>,
    counters: Arc<ReceiverCounters>,
}

impl BusReceiver {
    pub fn new(consumer: Box<dyn MessageConsumer>, counters: Arc<ReceiverCounters>) -> Self {
        Self { consumer, counters }
    }
}

#[async_trait]
impl Runner for BusReceiver {
    fn name(&self) -> &str {
        "bus-receiver"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), RunnerError> {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if let Err(e) = self.consumer.close().await {
                        tracing::warn!(error = %e, "Failed to close consumer");
                    }
                    return Ok(());
                }
                received = self.consumer.recv() => received,
            };

            match received {
                Ok(delivery) => {
                    if let Err(e) = self.consumer.ack(&delivery).await {
                        tracing::warn!(offset = delivery.offset, error = %e, "Failed to ack message");
                    }
                    let count = self.counters.bus.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!(
                        count,
                        message_id = delivery.message_id.as_deref().unwrap_or("-"),
                        payload = %String::from_utf8_lossy(&delivery.payload),
                        "Received bus message",
                    );
                }
                Err(BrokerError::Closed) => {
                    return Err(RunnerError::new(self.name(), BrokerError::Closed));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Bus receive error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use axum::body::Body;
    use axum::http::Request;
    use dem_events::{Envelope, MemoryBroker, MessageProducer};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn http_messages_are_counted() {
        let counters = Arc::new(ReceiverCounters::default());
        let app = http_router(counters.clone());

        for _ in 0..3 {
            let request = Request::post("/process")
                .body(Body::from(r#"{"device_id":"d1"}"#))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(body.is_empty());
        }

        assert_eq!(counters.http(), 3);
        assert_eq!(counters.bus(), 0);
        assert_eq!(counters.total(), 3);
    }

    #[tokio::test]
    async fn bus_messages_are_acked_and_counted() {
        let broker = Arc::new(MemoryBroker::new());
        let counters = Arc::new(ReceiverCounters::default());
        let receiver = Arc::new(BusReceiver::new(
            Box::new(broker.subscribe("device_data")),
            counters.clone(),
        ));

        for _ in 0..4 {
            broker.send("device_data", &Envelope::new(b"{}".to_vec())).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let receiver = receiver.clone();
            let cancel = cancel.clone();
            async move { receiver.run(cancel).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while counters.bus() < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(broker.acked().len(), 4);
        assert_eq!(counters.total(), 4);
    }

    #[tokio::test]
    async fn closed_subscription_is_fatal() {
        let broker = Arc::new(MemoryBroker::new());
        let receiver = BusReceiver::new(
            Box::new(broker.subscribe("device_data")),
            Arc::new(ReceiverCounters::default()),
        );
        broker.close();

        let result = receiver.run(CancellationToken::new()).await;

        assert_matches!(result, Err(e) if e.runner == "bus-receiver");
    }
}
