//! Integration tests for `POST /start/{route}`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_bytes, post, FailingPublisher, RecordingPublisher, READING_JSON};
use dem_core::{DeviceId, Publisher};

// ---------------------------------------------------------------------------
// Test: a valid reading fans out to the bound publisher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_reading_publishes_every_clone() {
    let http = Arc::new(RecordingPublisher::default());
    let bus = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http.clone(), bus.clone()),
    );

    let response = post(app, "/start/http", READING_JSON).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let published = http.published();
    assert_eq!(published.len(), 5);
    for (i, reading) in published.iter().enumerate() {
        assert_eq!(reading.device_id, DeviceId::from("d1"));
        assert_eq!(reading.timestamp, 1001 + i as i64);
        assert!((16.0..24.0).contains(&reading.temperature));
        assert!((40.0..60.0).contains(&reading.humidity));
    }
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn event_bus_route_uses_event_bus_publisher() {
    let http = Arc::new(RecordingPublisher::default());
    let bus = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(3),
        common::bindings(http.clone(), bus.clone()),
    );

    let response = post(app, "/start/event-bus", READING_JSON).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bus.published().len(), 3);
    assert!(http.published().is_empty());
}

#[tokio::test]
async fn zero_clone_count_returns_ok_without_publishing() {
    let http = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(0),
        common::bindings(http.clone(), http.clone()),
    );

    let response = post(app, "/start/http", READING_JSON).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(http.published().is_empty());
}

// ---------------------------------------------------------------------------
// Test: rejected requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_body_returns_400_and_publishes_nothing() {
    let http = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http.clone(), http.clone()),
    );

    let response = post(app, "/start/http", "not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await.is_empty());
    assert!(http.published().is_empty());
}

#[tokio::test]
async fn wrongly_typed_field_returns_400() {
    let http = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http.clone(), http.clone()),
    );

    let body = r#"{"device_id":"d1","time":"soon","temperature":20.0,"humidity":50.0}"#;
    let response = post(app, "/start/http", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(http.published().is_empty());
}

#[tokio::test]
async fn publish_failure_returns_500() {
    let http: Arc<dyn Publisher> = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http, Arc::new(FailingPublisher)),
    );

    let response = post(app, "/start/event-bus", READING_JSON).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn unbound_route_returns_404() {
    let http = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http.clone(), http.clone()),
    );

    let response = post(app, "/start/carrier-pigeon", READING_JSON).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(http.published().is_empty());
}

#[tokio::test]
async fn timestamp_overflow_returns_400() {
    let http = Arc::new(RecordingPublisher::default());
    let app = common::build_test_app(
        common::policy(5),
        common::bindings(http.clone(), http.clone()),
    );

    let body = format!(
        r#"{{"device_id":"d1","time":{},"temperature":20.0,"humidity":50.0}}"#,
        i64::MAX - 2
    );
    let response = post(app, "/start/http", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(http.published().is_empty());
}

#[tokio::test]
async fn mutation_overflowing_f64_returns_400_and_publishes_nothing() {
    let http = Arc::new(RecordingPublisher::default());
    let policy = dem_core::MutationPolicy {
        min_variance: 0.2,
        max_variance: 0.2,
        clone_count: 3,
    };
    let app = common::build_test_app(policy, common::bindings(http.clone(), http.clone()));

    let body = r#"{"device_id":"d1","time":1,"temperature":1.7e308,"humidity":50.0}"#;
    let response = post(app, "/start/http", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(http.published().is_empty());
}
