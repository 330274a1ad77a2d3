//! `receiver-mock` -- downstream sink for local runs of the multiplier.
//!
//! Counts readings arriving on `POST /process` and on the event-bus topic,
//! and logs the totals on shutdown.

use std::sync::Arc;

use anyhow::Context;
use dem_api::server::HttpServer;
use dem_events::KafkaConsumer;
use dem_service::config::ReceiverConfig;
use dem_service::receiver::{http_router, BusReceiver, ReceiverCounters};
use dem_service::signal::shutdown_signal;
use dem_service::supervisor::Supervisor;
use dem_service::telemetry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init("receiver_mock=info,dem_service=info,dem_api=info,tower_http=info");

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "Receiver mock failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ReceiverConfig::from_env().context("Invalid configuration")?;
    let counters = Arc::new(ReceiverCounters::default());

    let server = HttpServer::bind(&config.server, http_router(counters.clone()))
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr()))?;

    let consumer = KafkaConsumer::subscribe(&config.kafka, &config.group_name, &config.topic)
        .with_context(|| format!("Failed to subscribe to '{}'", config.topic))?;

    tracing::info!(
        port = config.server.port,
        topic = %config.topic,
        group = %config.group_name,
        "Receiver mock listening",
    );

    let mut supervisor = Supervisor::new();
    supervisor.add(Arc::new(server));
    supervisor.add(Arc::new(BusReceiver::new(Box::new(consumer), counters.clone())));
    let result = supervisor.run(shutdown_signal()).await;

    tracing::info!(
        total = counters.total(),
        http = counters.http(),
        bus = counters.bus(),
        "Receiver mock stopped",
    );

    result.map_err(Into::into)
}
