//! Export types
//!
//! Media formats produced by the encoder and the blob handed to a download
//! collaborator.

use crate::storage::SinkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container/codec of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Webm,
    Mp4,
}

impl MediaFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Webm => "webm",
            MediaFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Webm => "video/webm",
            MediaFormat::Mp4 => "video/mp4",
        }
    }

    /// Get the FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            MediaFormat::Webm => "libvpx",
            MediaFormat::Mp4 => "libx264",
        }
    }

    /// FFmpeg output arguments for a stream written to stdout
    pub fn ffmpeg_output_args(&self) -> Vec<&'static str> {
        match self {
            MediaFormat::Webm => vec![
                "-c:v", "libvpx", "-deadline", "realtime", "-b:v", "2M", "-f", "webm",
            ],
            // Fragmented so the stream is usable before the encoder exits
            MediaFormat::Mp4 => vec![
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "frag_keyframe+empty_moov",
                "-f",
                "mp4",
            ],
        }
    }

    /// Format implied by a file name's extension
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "webm" => Some(MediaFormat::Webm),
            "mp4" => Some(MediaFormat::Mp4),
            _ => None,
        }
    }
}

/// A finalized recording ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No finalized recording named {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SinkError> for ExportError {
    fn from(error: SinkError) -> Self {
        match error {
            SinkError::NotFound(name) => ExportError::NotFound(name),
            other => ExportError::Storage(other),
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(MediaFormat::from_name("capture.webm"), Some(MediaFormat::Webm));
        assert_eq!(MediaFormat::from_name("capture.MP4"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::from_name("capture"), None);
        assert_eq!(MediaFormat::Mp4.mime_type(), "video/mp4");
    }

    #[test]
    fn test_sink_not_found_maps_to_not_found() {
        let error = ExportError::from(SinkError::NotFound("capture.webm".into()));
        assert!(matches!(error, ExportError::NotFound(name) if name == "capture.webm"));
    }
}
