//! One in-progress relay of a single file.

use crate::ServerEvent;
use crate::store::StoredFile;
use crate::transfer::utils::compute_progress;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Which side ended a transfer early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SenderLeft,
    ReceiverLeft,
}

/// How a session's stream loop ended
#[derive(Debug)]
pub enum SessionOutcome {
    Completed,
    ReadFailed(io::Error),
    /// Cancellation token fired
    Cancelled,
    /// A peer's outbound queue closed under us
    PeerGone(StopReason),
}

pub(crate) enum Delivery {
    Sent,
    Cancelled,
    Closed,
}

pub struct TransferSession {
    file_id: String,
    total_bytes: u64,
    bytes_sent: u64,
    chunk_size: usize,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl TransferSession {
    pub fn new(file: StoredFile, chunk_size: usize) -> Self {
        Self {
            file_id: file.id,
            total_bytes: file.size,
            bytes_sent: 0,
            chunk_size: chunk_size.max(1),
            reader: file.reader,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn progress(&self) -> u8 {
        compute_progress(self.bytes_sent, self.total_bytes)
    }

    /// Read the next chunk, counting it as sent. `None` once `total_bytes`
    /// have been read; a file shorter than its recorded size is an error.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let remaining = self.total_bytes - self.bytes_sent;
        if remaining == 0 {
            return Ok(None);
        }

        let len = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await?;
        self.bytes_sent += len as u64;
        Ok(Some(buf))
    }

    /// Stream every chunk to the receiver, mirroring progress to the sender.
    /// Stops before the next read or send once `cancel` fires.
    pub async fn run(
        &mut self,
        to_receiver: &mpsc::Sender<ServerEvent>,
        to_sender: &mpsc::Sender<ServerEvent>,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Cancelled,
                chunk = self.next_chunk() => chunk,
            };

            let chunk = match chunk {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return SessionOutcome::Completed,
                Err(e) => return SessionOutcome::ReadFailed(e),
            };

            let progress = self.progress();
            let event = ServerEvent::FileChunk {
                file_id: self.file_id.clone(),
                chunk: STANDARD.encode(&chunk),
                progress,
            };
            match deliver(to_receiver, event, cancel).await {
                Delivery::Sent => {}
                Delivery::Cancelled => return SessionOutcome::Cancelled,
                Delivery::Closed => return SessionOutcome::PeerGone(StopReason::ReceiverLeft),
            }

            match deliver(to_sender, ServerEvent::TransferProgress { progress }, cancel).await {
                Delivery::Sent => {}
                Delivery::Cancelled => return SessionOutcome::Cancelled,
                Delivery::Closed => return SessionOutcome::PeerGone(StopReason::SenderLeft),
            }
        }
    }
}

/// Queue one event, waiting for space unless cancelled first
pub(crate) async fn deliver(
    tx: &mpsc::Sender<ServerEvent>,
    event: ServerEvent,
    cancel: &CancellationToken,
) -> Delivery {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Delivery::Cancelled,
        sent = tx.send(event) => match sent {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Closed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session_over(data: Vec<u8>, size: u64, chunk_size: usize) -> TransferSession {
        TransferSession::new(
            StoredFile {
                id: "token-data.bin".to_string(),
                size,
                reader: Box::new(Cursor::new(data)),
            },
            chunk_size,
        )
    }

    #[tokio::test]
    async fn test_chunks_cover_file() {
        let mut session = session_over(vec![7u8; 200_000], 200_000, 65_536);
        let mut lengths = vec![];
        while let Some(chunk) = session.next_chunk().await.unwrap() {
            lengths.push(chunk.len());
        }

        assert_eq!(lengths, vec![65_536, 65_536, 65_536, 3_392]);
        assert_eq!(session.bytes_sent(), 200_000);
        assert_eq!(session.progress(), 100);
    }

    #[tokio::test]
    async fn test_short_file_is_error() {
        let mut session = session_over(vec![1u8; 10], 20, 64);
        let err = session.next_chunk().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_never_reads_past_recorded_size() {
        // File grew after it was opened
        let mut session = session_over(vec![1u8; 100], 40, 64);
        assert_eq!(session.next_chunk().await.unwrap().map(|c| c.len()), Some(40));
        assert!(session.next_chunk().await.unwrap().is_none());
        assert_eq!(session.bytes_sent(), session.total_bytes());
    }

    #[tokio::test]
    async fn test_run_emits_chunks_then_completes() {
        let (rx_tx, mut rx_rx) = mpsc::channel(16);
        let (tx_tx, mut tx_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let mut session = session_over(vec![9u8; 150], 150, 64);

        let outcome = session.run(&rx_tx, &tx_tx, &cancel).await;
        assert!(matches!(outcome, SessionOutcome::Completed));

        let mut decoded = 0;
        let mut last = 0;
        while let Ok(event) = rx_rx.try_recv() {
            let ServerEvent::FileChunk {
                chunk, progress, ..
            } = event
            else {
                panic!("expected only file-chunk events");
            };
            decoded += STANDARD.decode(chunk).unwrap().len();
            assert!(progress >= last);
            last = progress;
        }
        assert_eq!(decoded, 150);
        assert_eq!(last, 100);

        let mut mirrored = vec![];
        while let Ok(ServerEvent::TransferProgress { progress }) = tx_rx.try_recv() {
            mirrored.push(progress);
        }
        assert_eq!(mirrored, vec![43, 85, 100]);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let (rx_tx, mut rx_rx) = mpsc::channel(16);
        let (tx_tx, _tx_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut session = session_over(vec![9u8; 150], 150, 64);

        let outcome = session.run(&rx_tx, &tx_tx, &cancel).await;
        assert!(matches!(outcome, SessionOutcome::Cancelled));
        assert!(rx_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_detects_closed_receiver() {
        let (rx_tx, rx_rx) = mpsc::channel(16);
        let (tx_tx, _tx_rx) = mpsc::channel(16);
        drop(rx_rx);
        let cancel = CancellationToken::new();
        let mut session = session_over(vec![9u8; 150], 150, 64);

        let outcome = session.run(&rx_tx, &tx_tx, &cancel).await;
        assert!(matches!(
            outcome,
            SessionOutcome::PeerGone(StopReason::ReceiverLeft)
        ));
    }
}
