//! Headless stream watcher.
//!
//! Starts the axum web server, the poll scheduler, event forwarding and
//! signal handling.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use stream_watch_lib::app::SharedState;
use stream_watch_lib::background;
use stream_watch_lib::server;
use stream_watch_lib::services::log_buffer::LogCaptureLayer;
use stream_watch_lib::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Step 1: Tracing (console + /api/logs capture)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(LogCaptureLayer::new())
        .init();

    tracing::info!("Starting stream watch (headless mode)");

    // Step 2: Foundation
    let (db, config, dir) = stream_watch_lib::init_foundation()?;
    let state = SharedState::new(db, config, dir).await?;

    // Step 3: Web server
    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state.clone()).await {
            tracing::error!("Server failed: {e}");
            server_state.shutdown_token().cancel();
        }
    });

    // Step 4: Core event forwarding to WebSocket clients
    let s = state.clone();
    tokio::spawn(async move { background::event_forward_loop(s).await });

    // Step 5: Poll scheduler
    let s = state.clone();
    tokio::spawn(async move { background::watch_loop(s).await });

    tracing::info!(
        port = state.server_port(),
        "Headless server running. Press Ctrl+C to stop."
    );

    // Wait for shutdown signal (or a server failure)
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = state.shutdown_token().cancelled() => {}
    }
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&state).await;
    let _ = server_handle.await;
    Ok(())
}
