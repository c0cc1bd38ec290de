//! Dispatch of inbound client events to the room table and transfers.

use crate::config::RelayConfig;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::room::{JoinOutcome, RoomTable};
use crate::store::FileStore;
use crate::transfer::TransferOrchestrator;
use crate::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    rooms: RoomTable,
    transfers: TransferOrchestrator,
    outbound_capacity: usize,
}

impl Relay {
    pub fn new(config: &RelayConfig, store: Arc<dyn FileStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            transfers: TransferOrchestrator::new(
                registry.clone(),
                store,
                config.chunk_size,
                config.cleanup_delay(),
            ),
            registry,
            rooms: RoomTable::new(),
            outbound_capacity: config.outbound_capacity,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    pub fn transfers(&self) -> &TransferOrchestrator {
        &self.transfers
    }

    /// Register a new connection and announce its id to it
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (id, outbound) = self.registry.register(self.outbound_capacity).await;
        self.registry
            .emit(
                &id,
                ServerEvent::Connected {
                    connection_id: id.clone(),
                },
            )
            .await;
        (id, outbound)
    }

    pub async fn handle(&self, connection_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom(room_code) => self.join_room(connection_id, &room_code).await,
            ClientEvent::StartTransfer {
                file_id,
                receiver_id,
            } => {
                self.start_transfer(connection_id, &file_id, &receiver_id)
                    .await
            }
        }
    }

    pub async fn join_room(&self, connection_id: &str, room_code: &str) {
        match self.rooms.join(connection_id, room_code).await {
            JoinOutcome::Joined { role, paired_with } => {
                tracing::info!(connection = %connection_id, "Joined room {} as {:?}", room_code, role);
                self.registry
                    .emit(
                        connection_id,
                        ServerEvent::RoomJoined {
                            role,
                            room_code: room_code.to_string(),
                        },
                    )
                    .await;

                // Runs in the joiner's reader loop, so a stalled sender must not block it
                if let Some(sender_id) = paired_with {
                    self.registry
                        .emit_detached(
                            &sender_id,
                            ServerEvent::UserJoined(connection_id.to_string()),
                        )
                        .await;
                }
            }
            JoinOutcome::Full => {
                tracing::warn!(connection = %connection_id, "Room {} is full", room_code);
                self.registry
                    .emit(connection_id, ServerEvent::RoomFull)
                    .await;
            }
        }
    }

    pub async fn start_transfer(&self, connection_id: &str, file_id: &str, receiver_id: &str) {
        if let Err(e) = self.transfers.start(connection_id, file_id, receiver_id).await {
            tracing::warn!(connection = %connection_id, "Transfer of {} rejected: {}", file_id, e);
        }
    }

    /// Tear down everything tied to a departing connection
    pub async fn disconnect(&self, connection_id: &str) {
        let stopped = self.transfers.on_disconnect(connection_id).await;
        if stopped > 0 {
            tracing::info!(connection = %connection_id, "Stopped {} transfer(s)", stopped);
        }

        if let Some(removed) = self.rooms.teardown(connection_id).await {
            tracing::info!("Closed room {}", removed.room_code);
            if let Some(survivor) = removed.survivor {
                self.registry
                    .emit_detached(&survivor, ServerEvent::PeerLeft(connection_id.to_string()))
                    .await;
            }
        }

        self.registry.unregister(connection_id).await;
    }
}
