// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::application::buffer::TelemetryBuffer;
use crate::application::poller::PollingEngine;
use crate::application::session::SessionManager;
use crate::infrastructure::collector_client::CollectorClient;
use crate::infrastructure::config::load_service_config;
use crate::infrastructure::credentials::FilePasswordSource;
use crate::infrastructure::file_sink::JsonLinesSink;
use crate::infrastructure::handshake::DeviceAuthenticator;
use crate::infrastructure::inverter_client::InverterClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, latest, latest_average};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let settings = load_service_config()?;
    let credentials = Arc::new(FilePasswordSource::load(&settings.device.password_file)?);

    let authenticator = Arc::new(DeviceAuthenticator::new(&settings.device.base_url)?);
    let source = Arc::new(InverterClient::new(&settings.device.base_url)?);
    let sink = Arc::new(JsonLinesSink::new(&settings.persistence.file));
    let forwarder = Arc::new(CollectorClient::new(&settings.collector.base_url)?);

    let buffer = TelemetryBuffer::new();
    let session = SessionManager::new(authenticator);

    let engine = PollingEngine::new(
        session,
        credentials,
        source,
        sink,
        forwarder,
        buffer.clone(),
        settings.poller.clone(),
    );
    let worker = engine.spawn();

    let state = Arc::new(AppState { buffer });
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/data/latest", get(latest))
        .route("/data/latestAverage", get(latest_average))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.listen).await?;
    tracing::info!("listening on {}", settings.server.listen);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the poller only after the server is down so queries stay live
    // for as long as we accept them.
    worker.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {err}");
    }
}
