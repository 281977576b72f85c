//! Recording state management
//!
//! Defines the recording state machine and session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording has been requested
    #[default]
    Idle,
    /// Sink and capture stream are being acquired
    Requesting,
    /// Chunks are flowing into the sink
    Recording,
    /// Waiting for the last append and finalize
    Stopping,
    /// Recording finalized successfully
    Stopped,
    /// Recording failed; see the controller's last error
    Errored,
}

impl RecordingState {
    /// Terminal states end a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }

    /// States in which a session is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Requesting | Self::Recording | Self::Stopping)
    }
}

/// Information about one recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: Uuid,
    pub state: RecordingState,

    /// Sink the session writes to
    pub sink_name: String,

    /// Chunks durably appended
    pub chunk_count: u64,

    /// Bytes durably appended
    pub bytes_written: u64,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RecordingSession {
    /// Create a new session starting now
    pub fn new(sink_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RecordingState::Requesting,
            sink_name: sink_name.into(),
            chunk_count: 0,
            bytes_written: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.chunk_count += 1;
        self.bytes_written += len as u64;
    }

    /// Session wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// Configuration for recordings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Fixed sink name for the recording slot, e.g. `capture.webm`
    pub sink_name: String,

    /// Target capture frame rate
    pub fps: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sink_name: "capture.webm".to_string(),
            fps: 30,
        }
    }
}
