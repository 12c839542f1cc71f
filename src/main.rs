//! CottFur Sync Server
//!
//! Keeps every connected client's view of each player's avatar model in
//! line. Native clients connect over TCP, browser/bridge clients over
//! WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cottfur_sync::config::ServerConfig;
use cottfur_sync::net::listener::{accept_tcp_connections, accept_websocket_connections};
use cottfur_sync::state::AppState;
use cottfur_sync::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up COTTFUR_* variables from a local .env, if any
    dotenv::dotenv().ok();

    init_logging();

    info!("CottFur Sync Server v{}", VERSION);

    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let state = Arc::new(AppState::new(config.clone(), shutdown_tx.clone()));

    let tcp_addr: SocketAddr = config
        .tcp_addr()
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.tcp_addr()))?;
    let tcp_listener = TcpListener::bind(tcp_addr).await?;
    info!("Sync server listening on: {}", tcp_addr);

    let tcp_handle = tokio::spawn(accept_tcp_connections(
        tcp_listener,
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    let ws_handle = if config.websocket_enabled() {
        let ws_addr: SocketAddr = config
            .websocket_addr()
            .parse()
            .with_context(|| format!("Invalid bind address: {}", config.websocket_addr()))?;
        let ws_listener = TcpListener::bind(ws_addr).await?;
        info!("WebSocket server listening on: {}", ws_addr);

        Some(tokio::spawn(accept_websocket_connections(
            ws_listener,
            state.clone(),
            shutdown_tx.subscribe(),
        )))
    } else {
        warn!("WebSocket listener disabled");
        None
    };

    info!(
        server_name = %config.server_name,
        model_sync_enabled = config.model_sync_enabled,
        "Server startup complete!"
    );

    wait_for_shutdown(shutdown_tx.clone()).await?;

    info!("Shutting down server...");

    let _ = tcp_handle.await;
    if let Some(handle) = ws_handle {
        let _ = handle.await;
    }

    state.session_manager.disconnect_all();
    info!(
        remaining = state.session_manager.count(),
        "All sessions signalled"
    );

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cottfur_sync=debug"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    if std::env::var("COTTFUR_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to install Ctrl+C handler")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
    Ok(())
}
