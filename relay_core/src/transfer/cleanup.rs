//! Delayed deletion of relayed files.
//!
//! Each file id has at most one pending deletion. Scheduling again replaces
//! it, and starting a new transfer of the same id cancels it.

use crate::store::FileStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

struct PendingDeletion {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct DeletionScheduler {
    store: Arc<dyn FileStore>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<String, PendingDeletion>>>,
    generation: Arc<AtomicU64>,
}

impl DeletionScheduler {
    pub fn new(store: Arc<dyn FileStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Delete `file_id` once the delay has elapsed
    pub async fn schedule(&self, file_id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        {
            let mut pending = self.pending.lock().await;
            if let Some(previous) = pending.insert(
                file_id.to_string(),
                PendingDeletion {
                    generation,
                    cancel: cancel.clone(),
                },
            ) {
                previous.cancel.cancel();
            }
        }

        let this = self.clone();
        let file_id = file_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Deletion of {} cancelled", file_id);
                    return;
                }
                _ = tokio::time::sleep(this.delay) => {}
            }

            // Held through the removal: a concurrent `cancel` either wins
            // before this check or returns after the file is gone
            let mut pending = this.pending.lock().await;
            match pending.get(&file_id) {
                Some(entry) if entry.generation == generation => {
                    pending.remove(&file_id);
                }
                // Replaced or cancelled while the timer fired
                _ => return,
            }

            match this.store.remove(&file_id).await {
                Ok(()) => tracing::info!("Deleted relayed file {}", file_id),
                Err(e) => tracing::warn!("Failed to delete relayed file {}: {}", file_id, e),
            }
            drop(pending);
        });
    }

    /// Cancel a pending deletion. Returns false if none was pending, in which
    /// case any deletion that already fired has finished.
    pub async fn cancel(&self, file_id: &str) -> bool {
        match self.pending.lock().await.remove(file_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_pending(&self, file_id: &str) -> bool {
        self.pending.lock().await.contains_key(file_id)
    }
}
