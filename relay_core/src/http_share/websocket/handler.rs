//! WebSocket connection handler

use super::messages::{ClientEvent, PING_INTERVAL_SECS, ServerEvent};
use super::state::RelayState;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle one relay client from upgrade to disconnect
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>, client_ip: String) {
    let (sender, mut receiver) = socket.split();
    let relay = state.relay.clone();

    let (connection_id, outbound) = relay.connect().await;
    tracing::info!(
        connection = %connection_id,
        "WebSocket connection established from: {}",
        client_ip
    );

    let writer = tokio::spawn(write_events(sender, outbound, connection_id.clone()));

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => relay.handle(&connection_id, event).await,
                Err(e) => {
                    tracing::debug!(connection = %connection_id, "Ignoring unparseable frame: {}", e);
                }
            },
            Some(Ok(Message::Close(_))) => {
                tracing::info!(connection = %connection_id, "Client closed WebSocket connection");
                break;
            }
            Some(Ok(Message::Pong(_))) => {
                tracing::trace!(connection = %connection_id, "Received pong");
            }
            Some(Err(e)) => {
                tracing::warn!(connection = %connection_id, "WebSocket error: {}", e);
                break;
            }
            None => {
                tracing::debug!(connection = %connection_id, "WebSocket stream ended");
                break;
            }
            // Binary frames and pings carry nothing for the relay
            Some(Ok(_)) => {}
        }
    }

    relay.disconnect(&connection_id).await;
    writer.abort();
    tracing::info!(connection = %connection_id, "Disconnected {}", client_ip);
}

/// Pump queued events to the socket, pinging on an interval
async fn write_events(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerEvent>,
    connection_id: String,
) {
    let mut ping_interval =
        tokio::time::interval(tokio::time::Duration::from_secs(PING_INTERVAL_SECS));
    ping_interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if let Err(e) = sender.send(Message::Ping(bytes::Bytes::new())).await {
                    tracing::debug!(connection = %connection_id, "Failed to send ping: {}", e);
                    return;
                }
            }
            event = outbound.recv() => {
                let Some(event) = event else {
                    break;
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(connection = %connection_id, "Failed to encode {}: {}", event.name(), e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    tracing::debug!(connection = %connection_id, "Failed to send {}: {}", event.name(), e);
                    return;
                }
            }
        }
    }

    // Queue closed: the connection was unregistered
    let _ = sender.send(Message::Close(None)).await;
}
