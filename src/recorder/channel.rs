//! Encoder seam and recording errors
//!
//! An encoder turns the visible surface into an ordered stream of chunks.
//! Chunk boundaries are its own business.

use crate::export::MediaFormat;
use crate::render::SurfaceHandle;
use crate::storage::SinkError;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Bound of the encoder→writer queue; a full queue makes the encoder wait
pub const CHUNK_QUEUE_CAPACITY: usize = 32;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Storage error: {0}")]
    Storage(#[from] SinkError),

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Chunk out of order: expected {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// One encoder-delivered unit of media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Starts at 0 and increases by one per chunk
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self { sequence, data }
    }
}

/// Bounded queue used between an encoder and the sink writer
pub fn chunk_channel() -> (mpsc::Sender<Chunk>, mpsc::Receiver<Chunk>) {
    mpsc::channel(CHUNK_QUEUE_CAPACITY)
}

/// Captures the visible surface as an encoded chunk stream
#[async_trait]
pub trait SurfaceEncoder: Send {
    /// Encoder identifier for logs
    fn id(&self) -> &str;

    /// Container/codec the chunks are in
    fn format(&self) -> MediaFormat;

    /// Begin capturing; chunks arrive on the returned receiver
    async fn start(&mut self, surface: SurfaceHandle, fps: u32) -> RecordingResult<mpsc::Receiver<Chunk>>;

    /// Stop capturing. Calling it on a stopped encoder is a no-op.
    async fn stop(&mut self) -> RecordingResult<()>;
}
