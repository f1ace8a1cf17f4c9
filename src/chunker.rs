use std::path::Path;

use axum::body::{Body, Bytes};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};

use crate::error::{InstallerError, Result};
use crate::progress::ProgressReporter;
use crate::status::InstallerStatus;

/// payload chunk size (512 KiB)
pub const CHUNK_SIZE: usize = 512 * 1024;

/// progress of one in-flight payload stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    /// file size at open time, 0 when unknown
    pub total_bytes: u64,
    pub bytes_read: u64,
    pub bytes_sent: u64,
    pub chunks_sent: u64,
    pub chunk_size: usize,
    pub status: InstallerStatus,
}

impl TransferState {
    fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            bytes_read: 0,
            bytes_sent: 0,
            chunks_sent: 0,
            chunk_size: CHUNK_SIZE,
            status: InstallerStatus::SendingPayload,
        }
    }

    /// bytes still allowed to be read for this chunk
    fn next_read_len(&self) -> usize {
        if self.total_bytes == 0 {
            return self.chunk_size;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_read);
        remaining.min(self.chunk_size as u64) as usize
    }
}

/// sequential, forward-only reader over the payload file
///
/// The file handle is dropped as soon as the end of the file is reached or a
/// read fails; after that `next_chunk` keeps returning `Ok(None)`.
#[derive(Debug)]
pub struct PayloadChunker {
    file: Option<File>,
    state: TransferState,
}

impl PayloadChunker {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await.map_err(InstallerError::PayloadOpen)?;
        let total_bytes = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        tracing::debug!("Opened payload {:?} ({} bytes)", path, total_bytes);
        Ok(Self {
            file: Some(file),
            state: TransferState::new(total_bytes),
        })
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// read the next chunk, `None` once the file is exhausted
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let want = self.state.next_read_len();
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };
        if want == 0 {
            self.file = None;
            return Ok(None);
        }

        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            match file.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.file = None;
                    return Err(InstallerError::PayloadStream(e));
                }
            }
        }

        if filled == 0 {
            self.file = None;
            return Ok(None);
        }
        buf.truncate(filled);
        self.state.bytes_read += filled as u64;
        Ok(Some(Bytes::from(buf)))
    }

    fn record_sent(&mut self, len: usize) {
        self.state.bytes_sent += len as u64;
        self.state.chunks_sent += 1;
    }

    fn finish(&mut self, status: InstallerStatus) {
        self.file = None;
        self.state.status = status;
    }
}

enum Step {
    Read,
    Send(Bytes),
    Finish,
    Fail(InstallerError),
}

/// stream the payload into a response body
///
/// A background task pulls chunks one at a time and hands them to the body
/// through a single-slot channel, so at most one chunk is in flight.
/// Flipping `cancelled` to true ends the transfer, even while a chunk is
/// waiting on a stalled client.
pub fn stream_payload(
    chunker: PayloadChunker,
    reporter: ProgressReporter,
    cancelled: watch::Receiver<bool>,
) -> Body {
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    tokio::spawn(drive(chunker, reporter, cancelled, tx));

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
    });
    Body::from_stream(stream)
}

async fn drive(
    mut chunker: PayloadChunker,
    reporter: ProgressReporter,
    mut cancelled: watch::Receiver<bool>,
    tx: mpsc::Sender<Bytes>,
) {
    let total = chunker.state().total_bytes;
    let mut step = Step::Read;

    loop {
        let stopped = *cancelled.borrow();
        step = match step {
            Step::Read if stopped => {
                Step::Fail(InstallerError::SessionStopped)
            }
            Step::Read => match chunker.next_chunk().await {
                Ok(Some(chunk)) => Step::Send(chunk),
                Ok(None) => Step::Finish,
                Err(e) => Step::Fail(e),
            },
            Step::Send(chunk) => {
                let len = chunk.len();
                tokio::select! {
                    sent = tx.send(chunk) => match sent {
                        Ok(()) => {
                            chunker.record_sent(len);
                            reporter
                                .chunk_sent(chunker.state().bytes_sent, total)
                                .await;
                            Step::Read
                        }
                        Err(_) => Step::Fail(InstallerError::ClientDisconnected),
                    },
                    _ = stop_requested(&mut cancelled) => Step::Fail(InstallerError::SessionStopped),
                }
            }
            Step::Finish => {
                let sent = chunker.state().bytes_sent;
                chunker.finish(InstallerStatus::Completed { total_bytes: sent });
                reporter.completed(sent).await;
                break;
            }
            Step::Fail(e) => {
                chunker.finish(InstallerStatus::Broken);
                reporter
                    .failed(chunker.state().bytes_sent, total, &e.to_string())
                    .await;
                break;
            }
        };
    }

    let state = chunker.state();
    tracing::debug!(
        "Transfer ended as {:?} after {} chunks ({} / {} bytes)",
        state.status,
        state.chunks_sent,
        state.bytes_sent,
        state.total_bytes
    );
    // dropping `tx` ends the response body
}

// resolves once the session asks streams to stop; a dropped sender never does
async fn stop_requested(cancelled: &mut watch::Receiver<bool>) {
    if cancelled.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}
