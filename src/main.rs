//! Warden Back binary entrypoint wiring the MQTT gateway, the orchestrator,
//! and the session control API.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_back::{
    config::AppConfig,
    gateway::IngestionGateway,
    orchestrator::Orchestrator,
    registry::RegistryClient,
    routes,
    state::{AppState, SharedState},
    topic,
    transport::HardwareTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Missing credentials are fatal before any connection is accepted.
    let config = AppConfig::from_env().context("loading configuration")?;
    let registry = RegistryClient::new(&config.registry_url, &config.internal_token)
        .context("building registry client")?;

    info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        registry = %config.registry_url,
        rooms = config.rooms.len(),
        "starting warden-back"
    );

    let port = config.port;
    let app_state = AppState::new(config);

    // Hardware ingestion pipeline: transport loop -> gateway worker -> bus.
    let patterns = topic::subscription_patterns()
        .into_iter()
        .map(str::to_string)
        .collect();
    let transport = HardwareTransport::connect(&app_state.config().mqtt, patterns);
    let raw_rx = transport.spawn(app_state.clone());
    tokio::spawn(IngestionGateway::new(app_state.clone(), registry).run(raw_rx));

    // Orchestration worker consuming the domain-events channel.
    tokio::spawn(Orchestrator::new(app_state.clone()).run());

    // Control API for session lifecycle, liveness, and the event feed.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting control API");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
