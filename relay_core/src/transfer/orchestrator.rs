//! Starts, tracks and tears down transfer sessions.
//!
//! Sessions are keyed by the sender's connection id; a sender runs at most
//! one at a time. Each session streams from its own task so a slow transfer
//! never blocks another.

use crate::error::{RelayError, Result};
use crate::registry::{ConnectionId, ConnectionRegistry, send_bounded};
use crate::store::FileStore;
use crate::transfer::cleanup::DeletionScheduler;
use crate::transfer::constants::{
    ALREADY_ACTIVE_MESSAGE, CHUNK_SIZE, FILE_NOT_FOUND_MESSAGE, READ_ERROR_MESSAGE, RECEIVER_LEFT_MESSAGE,
    RECEIVER_MISSING_MESSAGE, TRANSFER_ERROR_MESSAGE,
};
use crate::transfer::session::{Delivery, SessionOutcome, StopReason, TransferSession, deliver};
use crate::{FileMeta, ServerEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Tracking record for a running session
struct ActiveTransfer {
    session_no: u64,
    file_id: String,
    receiver_id: ConnectionId,
    cancel: CancellationToken,
    stop_reason: Arc<OnceLock<StopReason>>,
}

/// Summary of a running transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInfo {
    pub sender_id: ConnectionId,
    pub receiver_id: ConnectionId,
    pub file_id: String,
}

#[derive(Clone)]
pub struct TransferOrchestrator {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn FileStore>,
    cleanup: DeletionScheduler,
    active: Arc<Mutex<HashMap<ConnectionId, ActiveTransfer>>>,
    chunk_size: usize,
    next_session: Arc<AtomicU64>,
}

impl TransferOrchestrator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn FileStore>,
        chunk_size: usize,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            registry,
            cleanup: DeletionScheduler::new(store.clone(), cleanup_delay),
            store,
            active: Arc::new(Mutex::new(HashMap::new())),
            chunk_size: chunk_size.clamp(1, CHUNK_SIZE),
            next_session: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cleanup(&self) -> &DeletionScheduler {
        &self.cleanup
    }

    /// Begin relaying `file_id` from `caller_id` to `receiver_id`.
    ///
    /// Precondition failures are reported to the caller as `transfer-error`
    /// and returned; no session is created for them.
    pub async fn start(
        &self,
        caller_id: &str,
        file_id: &str,
        receiver_id: &str,
    ) -> Result<FileMeta> {
        let Some(to_sender) = self.registry.sender(caller_id).await else {
            return Err(RelayError::NotConnected(caller_id.to_string()));
        };

        if self.is_active(caller_id).await {
            send_bounded(&to_sender, ServerEvent::transfer_error(ALREADY_ACTIVE_MESSAGE)).await;
            return Err(RelayError::TransferInProgress(caller_id.to_string()));
        }

        // Cancel before opening so a stale deletion cannot remove the file under us
        let deletion_cancelled = self.cleanup.cancel(file_id).await;
        if deletion_cancelled {
            tracing::debug!("Cancelled pending deletion of {}", file_id);
        }

        let stored = match self.store.open(file_id).await {
            Ok(stored) => stored,
            Err(e) => {
                let message = match e {
                    RelayError::FileNotFound(_) | RelayError::InvalidFileId(_) => {
                        FILE_NOT_FOUND_MESSAGE
                    }
                    _ => {
                        self.restore_deletion(file_id, deletion_cancelled).await;
                        READ_ERROR_MESSAGE
                    }
                };
                send_bounded(&to_sender, ServerEvent::transfer_error(message)).await;
                return Err(e);
            }
        };

        let Some(to_receiver) = self.registry.sender(receiver_id).await else {
            self.restore_deletion(file_id, deletion_cancelled).await;
            send_bounded(&to_sender, ServerEvent::transfer_error(RECEIVER_MISSING_MESSAGE)).await;
            return Err(RelayError::NotConnected(receiver_id.to_string()));
        };

        let meta = FileMeta::describe(file_id, stored.size);
        let cancel = CancellationToken::new();
        let stop_reason = Arc::new(OnceLock::new());
        let session_no = self.next_session.fetch_add(1, Ordering::Relaxed);

        {
            let mut active = self.active.lock().await;
            if active.contains_key(caller_id) {
                drop(active);
                self.restore_deletion(file_id, deletion_cancelled).await;
                send_bounded(&to_sender, ServerEvent::transfer_error(ALREADY_ACTIVE_MESSAGE)).await;
                return Err(RelayError::TransferInProgress(caller_id.to_string()));
            }
            active.insert(
                caller_id.to_string(),
                ActiveTransfer {
                    session_no,
                    file_id: file_id.to_string(),
                    receiver_id: receiver_id.to_string(),
                    cancel: cancel.clone(),
                    stop_reason: stop_reason.clone(),
                },
            );
        }

        tracing::info!(
            sender = %caller_id,
            receiver = %receiver_id,
            "Starting transfer of {} ({} bytes)",
            file_id,
            stored.size
        );

        let session = TransferSession::new(stored, self.chunk_size);
        let started = meta.clone();
        let this = self.clone();
        let caller_id = caller_id.to_string();
        tokio::spawn(async move {
            this.drive(
                caller_id,
                session_no,
                started,
                session,
                to_sender,
                to_receiver,
                cancel,
                stop_reason,
            )
            .await;
        });

        Ok(meta)
    }

    async fn drive(
        self,
        caller_id: ConnectionId,
        session_no: u64,
        meta: FileMeta,
        mut session: TransferSession,
        to_sender: mpsc::Sender<ServerEvent>,
        to_receiver: mpsc::Sender<ServerEvent>,
        cancel: CancellationToken,
        stop_reason: Arc<OnceLock<StopReason>>,
    ) {
        // Metadata goes out before the first chunk
        let outcome = match deliver(&to_receiver, ServerEvent::TransferStarted(meta), &cancel).await
        {
            Delivery::Sent => session.run(&to_receiver, &to_sender, &cancel).await,
            Delivery::Cancelled => SessionOutcome::Cancelled,
            Delivery::Closed => SessionOutcome::PeerGone(StopReason::ReceiverLeft),
        };
        self.release(&caller_id, session_no).await;

        let stopped_by = match outcome {
            SessionOutcome::Completed => {
                tracing::info!(
                    sender = %caller_id,
                    "Transfer of {} complete ({} bytes)",
                    session.file_id(),
                    session.bytes_sent()
                );
                send_bounded(&to_sender, ServerEvent::TransferComplete).await;
                send_bounded(&to_receiver, ServerEvent::TransferComplete).await;
                self.cleanup.schedule(session.file_id()).await;
                return;
            }
            SessionOutcome::ReadFailed(e) => {
                tracing::warn!(
                    sender = %caller_id,
                    "Error reading {} after {} bytes: {}",
                    session.file_id(),
                    session.bytes_sent(),
                    e
                );
                send_bounded(&to_sender, ServerEvent::transfer_error(READ_ERROR_MESSAGE)).await;
                send_bounded(&to_receiver, ServerEvent::transfer_error(TRANSFER_ERROR_MESSAGE))
                    .await;
                return;
            }
            SessionOutcome::Cancelled => stop_reason
                .get()
                .copied()
                .unwrap_or(StopReason::SenderLeft),
            SessionOutcome::PeerGone(reason) => reason,
        };

        tracing::info!(
            sender = %caller_id,
            "Transfer of {} stopped at {}%: {:?}",
            session.file_id(),
            session.progress(),
            stopped_by
        );
        match stopped_by {
            StopReason::SenderLeft => {
                send_bounded(&to_receiver, ServerEvent::TransferCancelled).await;
            }
            StopReason::ReceiverLeft => {
                send_bounded(&to_sender, ServerEvent::transfer_error(RECEIVER_LEFT_MESSAGE)).await;
            }
        }
    }

    /// Put back a deletion that `start` cancelled before bailing out
    async fn restore_deletion(&self, file_id: &str, was_pending: bool) {
        if was_pending {
            self.cleanup.schedule(file_id).await;
        }
    }

    /// Drop the tracking record if it still belongs to this session
    async fn release(&self, caller_id: &str, session_no: u64) {
        let mut active = self.active.lock().await;
        if active
            .get(caller_id)
            .is_some_and(|t| t.session_no == session_no)
        {
            active.remove(caller_id);
        }
    }

    /// Stop every session `connection_id` takes part in, as sender or receiver.
    /// Returns how many were stopped.
    pub async fn on_disconnect(&self, connection_id: &str) -> usize {
        let mut active = self.active.lock().await;
        let mut stopped = 0;

        active.retain(|sender_id, transfer| {
            let reason = if sender_id == connection_id {
                StopReason::SenderLeft
            } else if transfer.receiver_id == connection_id {
                StopReason::ReceiverLeft
            } else {
                return true;
            };

            let _ = transfer.stop_reason.set(reason);
            transfer.cancel.cancel();
            stopped += 1;
            false
        });

        stopped
    }

    pub async fn is_active(&self, sender_id: &str) -> bool {
        self.active.lock().await.contains_key(sender_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn active_transfers(&self) -> Vec<TransferInfo> {
        self.active
            .lock()
            .await
            .iter()
            .map(|(sender_id, t)| TransferInfo {
                sender_id: sender_id.clone(),
                receiver_id: t.receiver_id.clone(),
                file_id: t.file_id.clone(),
            })
            .collect()
    }
}
