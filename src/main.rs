// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::infrastructure::config::{load_app_config, parse_utc_offset, resolve_channels_from_env};
use crate::infrastructure::thingspeak_repository::ThingSpeakRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let app_config = load_app_config().context("Failed to load configuration")?;
    let display_offset = parse_utc_offset(&app_config.display.utc_offset)?;
    let channels = resolve_channels_from_env(app_config.channels)?;
    app_config
        .defaults
        .validate()
        .context("Invalid default pipeline options")?;

    // Create telemetry source (infrastructure layer)
    let source = Arc::new(
        ThingSpeakRepository::new(
            app_config.telemetry.base_url,
            Duration::from_secs(app_config.telemetry.timeout_secs),
        )
        .context("Failed to build HTTP client")?,
    );

    // Create services (application layer)
    let dashboard_service =
        DashboardService::new(source, channels, app_config.defaults, display_offset);

    let state = Arc::new(AppState {
        dashboard_service,
        shared_secret: app_config.auth.shared_secret,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind_addr))?;
    tracing::info!("Starting drainwatch service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
