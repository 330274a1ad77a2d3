//! `device-event-multiplier` -- turns one telemetry reading into many.
//!
//! Serves `POST /start/{route}` over HTTP and consumes the subscribe topic
//! on the event bus; every reading is multiplied into `CLONE_NUM` perturbed
//! clones and republished. Configuration comes from the environment (see
//! `ServiceConfig`), optionally seeded from a `.env` file.

use std::sync::Arc;

use anyhow::Context;
use dem_api::router::build_app_router;
use dem_api::server::HttpServer;
use dem_api::state::AppState;
use dem_core::{Multiplier, PublisherBindings, ROUTE_EVENT_BUS, ROUTE_HTTP};
use dem_events::{
    BrokerBackend, BusPublisher, EventBusRouter, HttpPublisher, KafkaConsumer, KafkaProducer,
    MemoryBroker, MessageConsumer, MessageProducer,
};
use dem_service::config::ServiceConfig;
use dem_service::signal::shutdown_signal;
use dem_service::supervisor::Supervisor;
use dem_service::telemetry;

const DEFAULT_LOG_FILTER: &str =
    "device_event_multiplier=info,dem_service=info,dem_api=info,dem_events=info,tower_http=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init(DEFAULT_LOG_FILTER);

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "Device event multiplier failed");
        std::process::exit(1);
    }

    tracing::info!("Graceful shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ServiceConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        min_variance = config.policy.min_variance,
        max_variance = config.policy.max_variance,
        clone_count = config.policy.clone_count,
        "Loaded mutation policy",
    );

    let multiplier = Arc::new(Multiplier::new(config.policy));

    // --- Event bus ---
    let pub_sub = &config.pub_sub;
    let (producer, consumer): (Arc<dyn MessageProducer>, Box<dyn MessageConsumer>) =
        match pub_sub.backend {
            BrokerBackend::Kafka => {
                tracing::info!(brokers = %config.kafka.brokers, "Connecting to Kafka");
                let producer: Arc<dyn MessageProducer> = Arc::new(
                    KafkaProducer::new(&config.kafka).context("Failed to create Kafka producer")?,
                );
                let consumer = KafkaConsumer::subscribe(
                    &config.kafka,
                    &pub_sub.group_name,
                    &pub_sub.subscribe_topic,
                )
                .with_context(|| format!("Failed to subscribe to '{}'", pub_sub.subscribe_topic))?;
                (producer, Box::new(consumer) as Box<dyn MessageConsumer>)
            }
            BrokerBackend::Memory => {
                tracing::warn!("Using the in-process broker; nothing leaves this process");
                let broker = Arc::new(MemoryBroker::new());
                let consumer = broker.subscribe(&pub_sub.subscribe_topic);
                (broker as Arc<dyn MessageProducer>, Box::new(consumer) as Box<dyn MessageConsumer>)
            }
        };

    // --- Publishers ---
    let http_publisher = HttpPublisher::new(&config.http_publisher)
        .context("Failed to build HTTP publisher client")?;

    let mut publishers = PublisherBindings::new();
    publishers.insert(ROUTE_HTTP.to_string(), Arc::new(http_publisher));
    publishers.insert(
        ROUTE_EVENT_BUS.to_string(),
        Arc::new(BusPublisher::new(producer.clone(), pub_sub.publish_topic.clone())),
    );

    // --- Runners ---
    let state = AppState {
        multiplier: multiplier.clone(),
        publishers: Arc::new(publishers),
    };
    let app = build_app_router(state, config.server.request_timeout);
    let server = HttpServer::bind(&config.server, app)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr()))?;

    let router = EventBusRouter::new(
        pub_sub.handler_name.clone(),
        consumer,
        producer,
        pub_sub.publish_topic.clone(),
        multiplier,
        pub_sub.nack_resend,
    );

    tracing::info!(
        subscribe_topic = %pub_sub.subscribe_topic,
        publish_topic = %pub_sub.publish_topic,
        http_target = %config.http_publisher.url,
        "Starting runners",
    );

    let mut supervisor = Supervisor::new();
    supervisor.add(Arc::new(server));
    supervisor.add(Arc::new(router));
    supervisor.run(shutdown_signal()).await?;

    Ok(())
}
