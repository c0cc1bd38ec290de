//! HTTP server for the relay
//!
//! Serves the WebSocket relay, the upload endpoint and a health probe.

use crate::config::RelayConfig;
use crate::store::FileStore;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tokio_util::sync::CancellationToken;

use super::upload::upload_handler;
use super::websocket::{RelayState, ws_handler};

/// Default HTTP port for the relay
pub const HTTP_PORT: u16 = 8080;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    rooms: usize,
    connections: usize,
}

async fn health_handler(State(state): State<Arc<RelayState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        rooms: state.relay.rooms().len().await,
        connections: state.relay.registry().len().await,
    })
}

/// Handler for invalid routes
async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Build the axum router over shared relay state
pub fn create_router(state: Arc<RelayState>) -> Router {
    let max_upload = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/upload",
            post(upload_handler)
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_upload)),
        )
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Serve `router` on an already bound listener until `cancel_token` fires
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel_token: Option<CancellationToken>,
) -> Result<()> {
    let service = router.into_make_service_with_connect_info::<SocketAddr>();

    if let Some(ct) = cancel_token {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                ct.cancelled().await;
                tracing::info!("Relay server shutting down gracefully");
            })
            .await?;
    } else {
        axum::serve(listener, service).await?;
    }

    Ok(())
}

/// Bind the configured port and run the relay
pub async fn start_relay_server(
    config: RelayConfig,
    store: Arc<dyn FileStore>,
    cancel_token: Option<CancellationToken>,
) -> Result<()> {
    let addr = config.bind_addr();
    let state = Arc::new(RelayState::new(config, store));
    let router = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Relay server listening on {}", listener.local_addr()?);
    serve(listener, router, cancel_token).await
}
