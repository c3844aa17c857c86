//! HTTP surface for the wayfinder assistant
//!
//! Serves the chat stream, city search and suggestion endpoints over a
//! shared [`AppState`], and runs a background task that sweeps expired
//! rate-limit, trigger and cache records.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod rest_server;
mod state;
mod sweeper;

pub use rest_server::{build_router, ApiError};
pub use state::AppState;
pub use sweeper::{spawn_sweeper, sweep_interval};

// Re-export error types from core
pub use wayfinder_core::error::{Error, Result};

use tracing::info;
use wayfinder_core::config::Config;

/// Run the HTTP server until Ctrl+C
///
/// Builds the language model, dataset and services from `config`, starts
/// the sweeper and serves on `server.host:server.port`.
pub async fn run_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let sweeper = spawn_sweeper(state.conversation.clone(), sweep_interval(&config));
    let router = build_router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::with_context(format!("Failed to bind {addr}"), e))?;
    info!("Wayfinder listening on http://{addr}");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served.map_err(|e| Error::with_context("Server error", e))?;

    info!("Wayfinder stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
