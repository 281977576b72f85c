//! Sink writer task
//!
//! The only task that touches the open sink handle. Chunks are appended one
//! at a time in arrival order; the next append starts only after the
//! previous one resolved. On stop the channel is closed and whatever the
//! encoder flushed before it is still written ahead of finalize.

use super::channel::{Chunk, RecordingError, RecordingResult};
use super::coordinator::ControllerShared;
use super::state::RecordingState;
use crate::storage::{PersistentSink, SinkHandle};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub(crate) struct SinkWriter {
    sink: Arc<dyn PersistentSink>,
    handle: SinkHandle,
    chunks: mpsc::Receiver<Chunk>,
    stop: oneshot::Receiver<()>,
    shared: Arc<ControllerShared>,
}

impl SinkWriter {
    pub(crate) fn new(
        sink: Arc<dyn PersistentSink>,
        handle: SinkHandle,
        chunks: mpsc::Receiver<Chunk>,
        stop: oneshot::Receiver<()>,
        shared: Arc<ControllerShared>,
    ) -> Self {
        Self {
            sink,
            handle,
            chunks,
            stop,
            shared,
        }
    }

    /// Drain chunks until stopped or failed, then finalize and settle the
    /// controller state
    pub(crate) async fn run(mut self) -> RecordingResult<()> {
        let failure = self.pump().await;

        // Nothing more is accepted from here on
        self.chunks.close();

        let finalized = self.sink.finalize(&mut self.handle).await;

        match (failure, finalized) {
            (None, Ok(())) => {
                tracing::info!(
                    "Recording finalized: {} ({} bytes)",
                    self.handle.name(),
                    self.handle.bytes_written()
                );
                self.shared.set_state(RecordingState::Stopped);
                Ok(())
            }
            (None, Err(e)) => {
                let error = RecordingError::from(e);
                self.shared.fail(&error);
                Err(error)
            }
            (Some(error), finalized) => {
                if let Err(e) = finalized {
                    tracing::error!("Finalize after failure also failed: {}", e);
                }
                self.shared.fail(&error);
                Err(error)
            }
        }
    }

    async fn pump(&mut self) -> Option<RecordingError> {
        let mut expected = 0u64;
        loop {
            tokio::select! {
                biased;

                _ = &mut self.stop => {
                    // The encoder has already stopped; whatever it flushed is
                    // queued. Refuse anything newer and write the rest.
                    self.chunks.close();
                    while let Some(chunk) = self.chunks.recv().await {
                        if let Err(e) = self.write(chunk, &mut expected).await {
                            return Some(e);
                        }
                    }
                    return None;
                }

                chunk = self.chunks.recv() => {
                    let Some(chunk) = chunk else {
                        if self.shared.state() == RecordingState::Stopping {
                            return None;
                        }
                        return Some(RecordingError::Encoder(
                            "chunk stream ended before stop".to_string(),
                        ));
                    };

                    if let Err(e) = self.write(chunk, &mut expected).await {
                        return Some(e);
                    }
                }
            }
        }
    }

    async fn write(&mut self, chunk: Chunk, expected: &mut u64) -> RecordingResult<()> {
        if chunk.sequence != *expected {
            return Err(RecordingError::OutOfOrder {
                expected: *expected,
                got: chunk.sequence,
            });
        }

        if let Err(e) = self.sink.append(&mut self.handle, &chunk.data).await {
            tracing::error!("Append of chunk {} failed: {}", chunk.sequence, e);
            return Err(e.into());
        }

        *expected += 1;
        self.shared
            .chunk_written(chunk.sequence, chunk.data.len(), self.handle.bytes_written());
        Ok(())
    }
}
