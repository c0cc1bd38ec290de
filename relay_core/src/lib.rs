//! Room relay core: pairs two anonymous clients under a shared room code and
//! streams an uploaded file from one to the other over WebSocket events.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod http_share;
pub mod registry;
pub mod relay;
pub mod room;
pub mod store;
pub mod transfer;

pub use config::RelayConfig;
pub use error::RelayError;
pub use http_share::websocket::{ClientEvent, ServerEvent};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use relay::Relay;
pub use room::{JoinOutcome, Role, RoomTable};
pub use store::{DiskStore, FileStore, MemoryStore, StoredFile, StoredUpload};

use transfer::utils::{display_name, mime_type_for};

//Struct file metadata announced to the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Stored file id
    pub id: String,
    /// Display name (stored id without its unique prefix)
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl FileMeta {
    pub fn describe(file_id: &str, size: u64) -> Self {
        let name = display_name(file_id);
        Self {
            id: file_id.to_string(),
            name: name.to_string(),
            size,
            mime_type: mime_type_for(name).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let meta = FileMeta::describe("1699999999999-42-photo.png", 1234);
        assert_eq!(meta.name, "42-photo.png");
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size, 1234);

        let meta = FileMeta::describe("abc-notes.unknownext", 0);
        assert_eq!(meta.mime_type, "application/octet-stream");
    }
}
