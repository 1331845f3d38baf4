//! HTTP surface: the simulated APIs, the client log store and a WebSocket
//! stream of log snapshots.
mod api;
mod websocket;

use crate::handlers::{Api, Handlers};
use crate::logging::LogStore;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub store: LogStore,
    pub handlers: Handlers,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(Api::Analytics.endpoint(), post(api::analytics))
        .route(Api::Auth.endpoint(), post(api::auth))
        .route(Api::Database.endpoint(), post(api::database))
        .route(Api::Search.endpoint(), post(api::search))
        .route(Api::User.endpoint(), post(api::user))
        .route(
            "/api/logs",
            get(api::list_logs)
                .post(api::submit_log)
                .delete(api::clear_logs),
        )
        .route("/api/logs/export", get(api::export_logs))
        .route("/ws", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Web server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
