//! Live connection registry
//!
//! Every accepted WebSocket gets an opaque id and a bounded outbound queue.
//! All other components address peers through this registry.

use crate::ServerEvent;
use crate::http_share::websocket::EVENT_SEND_TIMEOUT_SECS;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Opaque per-connection identifier
pub type ConnectionId = String;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection with an outbound queue of `capacity` events
    pub async fn register(&self, capacity: usize) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.peers.write().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Drop a connection. Returns false if it was not registered.
    pub async fn unregister(&self, id: &str) -> bool {
        self.peers.write().await.remove(id).is_some()
    }

    /// Outbound queue handle for a connection
    pub async fn sender(&self, id: &str) -> Option<mpsc::Sender<ServerEvent>> {
        self.peers.read().await.get(id).cloned()
    }

    pub async fn is_connected(&self, id: &str) -> bool {
        self.peers.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Queue an event for a connection, waiting a bounded time for queue space.
    /// Returns false if the connection is unknown, its queue is closed, or the
    /// event was dropped because the queue stayed full.
    pub async fn emit(&self, id: &str, event: ServerEvent) -> bool {
        // Clone the handle so the lock is not held across the send
        let Some(tx) = self.sender(id).await else {
            tracing::debug!(connection_id = %id, "dropping event for unknown connection");
            return false;
        };
        send_bounded(&tx, event).await
    }

    /// Queue an event from a background task so the caller never waits on
    /// the target's queue. Returns false if the connection is unknown.
    pub async fn emit_detached(&self, id: &str, event: ServerEvent) -> bool {
        let Some(tx) = self.sender(id).await else {
            tracing::debug!(connection_id = %id, "dropping event for unknown connection");
            return false;
        };
        tokio::spawn(async move {
            send_bounded(&tx, event).await;
        });
        true
    }
}

/// Send a control event, giving up after `EVENT_SEND_TIMEOUT_SECS` on a full queue
pub async fn send_bounded(tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    let name = event.name();
    match tokio::time::timeout(Duration::from_secs(EVENT_SEND_TIMEOUT_SECS), tx.send(event)).await {
        Ok(sent) => sent.is_ok(),
        Err(_) => {
            tracing::warn!("outbound queue stalled, dropped {}", name);
            false
        }
    }
}
