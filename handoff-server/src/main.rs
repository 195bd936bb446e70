//! Handoff portal server (handoff-server) - Main entry point
//!
//! Serves the one-time-code login endpoints and the live notification
//! WebSocket for submitters and reviewers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use handoff_common::config::PortalConfig;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handoff_server::otc::LogCodeDelivery;
use handoff_server::realtime::ConnectionRegistry;
use handoff_server::{build_router, open_session_store, AppState};

/// Command-line arguments for handoff-server
#[derive(Parser, Debug)]
#[command(name = "handoff-server")]
#[command(about = "Login and live notification service for the image handoff portal")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HANDOFF_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "HANDOFF_PORT")]
    port: Option<u16>,

    /// SQLite database for login sessions (overrides the config file)
    #[arg(short, long, env = "HANDOFF_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) = PortalConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.storage.database_path = Some(database);
    }

    let default_filter = format!(
        "handoff_server={level},handoff_common={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Subscriber is only up now; report how the configuration was found.
    config_source.log();

    info!(
        "Starting handoff-server v{} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("HANDOFF_BUILD_ID"),
        env!("HANDOFF_BUILD_PROFILE"),
        env!("HANDOFF_BUILT_AT")
    );

    let store = open_session_store(&config.storage)
        .await
        .context("Failed to open session store")?;
    let state = AppState::new(store, Arc::new(LogCodeDelivery), &config);
    let registry = Arc::clone(&state.registry);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("handoff-server listening on http://{}", addr);
    info!("Live notifications: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves once the process is asked to stop
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    let signal = wait_for_signal().await;
    info!(
        signal,
        live_connections = registry.len(),
        "Shutdown requested, no longer accepting connections"
    );
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("SIGTERM handler unavailable, only Ctrl+C will stop the server: {}", e);
            return ctrl_c().await;
        }
    };

    tokio::select! {
        name = ctrl_c() => name,
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
