// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::dataset_service::DatasetService;
use crate::application::simulation_service::SimulationService;
use crate::infrastructure::child_process::ChildProcessSupervisor;
use crate::infrastructure::config::load_app_config;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    charts_snapshot, clean_dataset, health_check, simulation_status, start_simulation,
    stop_simulation, stream_charts,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Process supervisor (infrastructure layer)
    let supervisor = Arc::new(ChildProcessSupervisor::from_settings(&config.simulator)?);
    tracing::info!("Simulator executable: {}", supervisor.executable().display());

    // Create services (application layer)
    let simulation_service = SimulationService::new(
        supervisor,
        config.telemetry.missing_fields,
        config.stream.channel_capacity,
    );
    let dataset_service = DatasetService::new(
        config.datasets.input_dir.clone(),
        config.datasets.output_dir.clone(),
    );

    let state = Arc::new(AppState {
        simulation_service: simulation_service.clone(),
        dataset_service,
    });

    // Build router (presentation layer)
    // Responses are compressed by the handlers themselves, so no
    // CompressionLayer here.
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/simulation", get(simulation_status))
        .route("/simulation/start", post(start_simulation))
        .route("/simulation/stop", post(stop_simulation))
        .route("/charts", get(charts_snapshot))
        .route("/charts/stream", get(stream_charts))
        .route("/datasets/clean", post(clean_dataset))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_addr))?;
    tracing::info!("Starting potentiostat-monitor on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Same stop policy as a user-initiated stop; also ends the
            // live chart streams so the server can drain.
            simulation_service.shutdown().await;
        })
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
