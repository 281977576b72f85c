//! Recording system module
//!
//! Turns the visible surface into a persisted recording:
//! - SurfaceEncoder trait for capture/encode backends
//! - RecordingController state machine
//! - a single sink-writer task that appends chunks in order

pub mod channel;
pub mod coordinator;
pub mod ffmpeg;
pub mod state;
mod writer;

pub use channel::{chunk_channel, Chunk, RecordingError, RecordingResult, SurfaceEncoder};
pub use coordinator::{RecordingController, RecordingEvent};
pub use ffmpeg::FfmpegEncoder;
pub use state::{RecordingConfig, RecordingSession, RecordingState};
