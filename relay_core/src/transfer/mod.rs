//! File relay: sessions that stream an uploaded file to a paired receiver.
//!
//! This module provides:
//! - Chunked streaming with progress mirrored to the sender
//! - Session tracking keyed by the sender's connection
//! - Delayed, cancellable deletion of relayed files

pub mod cleanup;
pub mod constants;
pub mod orchestrator;
pub mod session;
pub mod utils;

// Re-export public API
pub use cleanup::DeletionScheduler;
pub use constants::{CHUNK_SIZE, CLEANUP_DELAY_SECS};
pub use orchestrator::{TransferInfo, TransferOrchestrator};
pub use session::{SessionOutcome, StopReason, TransferSession};
