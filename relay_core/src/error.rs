use crate::registry::ConnectionId;

/// Errors raised by the relay core
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No uploaded file with this id
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// File id that could escape the upload directory
    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    /// The sender already has a transfer running
    #[error("transfer already in progress for connection {0}")]
    TransferInProgress(ConnectionId),

    /// The addressed connection is not (or no longer) registered
    #[error("connection not registered: {0}")]
    NotConnected(ConnectionId),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
