/// Bytes read from disk and relayed per `file-chunk` event (64KB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Grace period before a relayed file is deleted (60 seconds)
pub const CLEANUP_DELAY_SECS: u64 = 60;

/// Maximum stored file name length
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Fallback MIME type for unknown extensions
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Error text sent when a requested file is missing
pub const FILE_NOT_FOUND_MESSAGE: &str = "File not found on server";

/// Error text sent to the sender when reading fails mid-stream
pub const READ_ERROR_MESSAGE: &str = "Error reading file";

/// Error text sent to the receiver when reading fails mid-stream
pub const TRANSFER_ERROR_MESSAGE: &str = "Error transferring file";

/// Error text sent when a sender starts a second concurrent transfer
pub const ALREADY_ACTIVE_MESSAGE: &str = "Transfer already in progress";

/// Error text sent when the addressed receiver is not connected
pub const RECEIVER_MISSING_MESSAGE: &str = "Receiver not connected";

/// Error text sent to the sender when the receiver drops mid-transfer
pub const RECEIVER_LEFT_MESSAGE: &str = "Receiver disconnected";
