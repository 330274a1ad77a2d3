#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;

use dem_api::config::ServerConfig;
use dem_api::router::build_app_router;
use dem_api::state::AppState;
use dem_core::{
    MutationPolicy, Multiplier, PublishError, Publisher, PublisherBindings, Reading, ROUTE_EVENT_BUS,
    ROUTE_HTTP,
};

pub const READING_JSON: &str =
    r#"{"device_id":"d1","time":1000,"temperature":20.0,"humidity":50.0}"#;

/// Build a test `ServerConfig` bound to an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout: Duration::from_secs(30),
        shutdown_grace: Duration::from_secs(10),
    }
}

pub fn policy(clone_count: u32) -> MutationPolicy {
    MutationPolicy {
        min_variance: -0.2,
        max_variance: 0.2,
        clone_count,
    }
}

/// Build the application router with the production middleware stack and
/// the given bindings.
pub fn build_test_app(policy: MutationPolicy, bindings: PublisherBindings) -> Router {
    let state = AppState {
        multiplier: Arc::new(Multiplier::seeded(policy, 7)),
        publishers: Arc::new(bindings),
    };
    build_app_router(state, test_config().request_timeout)
}

/// Bindings with `http` and `event-bus` both pointing at the given publishers.
pub fn bindings(
    http: Arc<dyn Publisher>,
    event_bus: Arc<dyn Publisher>,
) -> PublisherBindings {
    let mut bindings = PublisherBindings::new();
    bindings.insert(ROUTE_HTTP.to_string(), http);
    bindings.insert(ROUTE_EVENT_BUS.to_string(), event_bus);
    bindings
}

// ---------------------------------------------------------------------------
// Fake publishers
// ---------------------------------------------------------------------------

/// Records every published reading.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Reading>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<Reading> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn destination(&self) -> &str {
        "recording"
    }

    async fn publish(&self, readings: &[Reading]) -> Result<(), PublishError> {
        self.published.lock().unwrap().extend_from_slice(readings);
        Ok(())
    }
}

/// Always fails with a transport error.
pub struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    fn destination(&self) -> &str {
        "failing"
    }

    async fn publish(&self, _readings: &[Reading]) -> Result<(), PublishError> {
        Err(PublishError::Transport("broker unreachable".into()))
    }
}

/// Signals `entered` when a publish starts, then blocks until `release`.
#[derive(Default)]
pub struct GatedPublisher {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Publisher for GatedPublisher {
    fn destination(&self) -> &str {
        "gated"
    }

    async fn publish(&self, _readings: &[Reading]) -> Result<(), PublishError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
