//! WebSocket relay endpoint
//!
//! Each socket becomes one registered connection. Client frames are parsed
//! into [`ClientEvent`]s and handed to the [`Relay`](crate::Relay); queued
//! [`ServerEvent`]s are written back by a per-connection pump.

mod handler;
mod messages;
mod state;

pub use handler::handle_socket;
pub use messages::{ClientEvent, EVENT_SEND_TIMEOUT_SECS, PING_INTERVAL_SECS, ServerEvent};
pub use state::RelayState;

use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let client_ip = addr.ip().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_ip))
}
