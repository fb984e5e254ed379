//! Websocket relay pairing two parties per room and passing their signals along.

mod config;
mod relay_service;
mod ws_handler;

pub use config::{DEFAULT_BIND_ADDR, RelayConfig};
pub use relay_service::{RelayService, RoomFull};
pub use ws_handler::ws_handler;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/ws/{room}", get(ws_handler))
        .with_state(service)
}

/// Serves the relay on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, service: RelayService) -> Result<()> {
    axum::serve(listener, router(service))
        .await
        .context("relay server stopped")
}

pub async fn run(config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Relay listening on ws://{}", config.bind);

    serve(listener, RelayService::new(config.capacity)).await
}
