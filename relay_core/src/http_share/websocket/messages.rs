//! WebSocket event types and constants
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": <payload>}`;
//! events without a payload omit `data`.

use crate::FileMeta;
use crate::room::Role;
use serde::{Deserialize, Serialize};

/// Keep-alive ping interval (15 seconds)
pub const PING_INTERVAL_SECS: u64 = 15;

/// Longest wait for room on a full outbound queue before a control event is dropped (5 seconds)
pub const EVENT_SEND_TIMEOUT_SECS: u64 = 5;

/// Events from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Request a role in a room
    JoinRoom(String),
    /// Sender begins relaying an uploaded file
    #[serde(rename_all = "camelCase")]
    StartTransfer { file_id: String, receiver_id: String },
}

/// Events from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Id assigned to this connection
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },
    /// Role granted
    #[serde(rename_all = "camelCase")]
    RoomJoined { role: Role, room_code: String },
    /// Join rejected, room already has two occupants
    RoomFull,
    /// Receiver paired (sent to the sender, carries the receiver's id)
    UserJoined(String),
    /// The other occupant disconnected and the room was closed
    PeerLeft(String),
    /// File metadata, sent to the receiver before the first chunk
    TransferStarted(FileMeta),
    /// One base64 encoded chunk
    #[serde(rename_all = "camelCase")]
    FileChunk {
        file_id: String,
        chunk: String,
        progress: u8,
    },
    /// Progress mirrored to the sender
    TransferProgress { progress: u8 },
    TransferComplete,
    TransferError { message: String },
    /// Sender disconnected mid-transfer
    TransferCancelled,
}

impl ServerEvent {
    pub fn transfer_error(message: impl Into<String>) -> Self {
        Self::TransferError {
            message: message.into(),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RoomJoined { .. } => "room-joined",
            Self::RoomFull => "room-full",
            Self::UserJoined(_) => "user-joined",
            Self::PeerLeft(_) => "peer-left",
            Self::TransferStarted(_) => "transfer-started",
            Self::FileChunk { .. } => "file-chunk",
            Self::TransferProgress { .. } => "transfer-progress",
            Self::TransferComplete => "transfer-complete",
            Self::TransferError { .. } => "transfer-error",
            Self::TransferCancelled => "transfer-cancelled",
        }
    }
}
