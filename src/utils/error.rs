//! Error types and handling
//!
//! Common error types used across the application.

use crate::config::ConfigError;
use crate::detect::{DetectorError, SchedulerError};
use crate::export::ExportError;
use crate::recorder::RecordingError;
use crate::render::CompositorError;
use crate::storage::SinkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Detection error: {0}")]
    Detection(#[from] DetectorError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Render error: {0}")]
    Render(#[from] CompositorError),

    #[error("Storage error: {0}")]
    Storage(#[from] SinkError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Error response for a UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(code: &str, message: impl ToString) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

fn sink_code(error: &SinkError) -> &'static str {
    match error {
        SinkError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        SinkError::AlreadyOpen(_) => "ALREADY_OPEN",
        SinkError::Io(_) | SinkError::Closed(_) => "IO_ERROR",
        SinkError::NotFound(_) => "NOT_FOUND",
        SinkError::InvalidName(_) => "INVALID_NAME",
    }
}

fn recording_code(error: &RecordingError) -> &'static str {
    match error {
        RecordingError::Storage(e) => sink_code(e),
        RecordingError::EncoderUnavailable(_) => "ENCODER_UNAVAILABLE",
        RecordingError::Encoder(_) | RecordingError::OutOfOrder { .. } => "ENCODER_ERROR",
        RecordingError::Io(_) => "IO_ERROR",
    }
}

impl From<&SinkError> for ErrorResponse {
    fn from(error: &SinkError) -> Self {
        Self::new(sink_code(error), error)
    }
}

impl From<&RecordingError> for ErrorResponse {
    fn from(error: &RecordingError) -> Self {
        Self::new(recording_code(error), error)
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Detection(_) => "DETECTION_ERROR",
            AppError::Scheduler(_) => "CONFIG_ERROR",
            AppError::Render(_) => "RENDER_ERROR",
            AppError::Storage(e) => sink_code(e),
            AppError::Recording(e) => recording_code(e),
            AppError::Export(ExportError::NotFound(_)) => "NOT_FOUND",
            AppError::Export(ExportError::Storage(e)) => sink_code(e),
            AppError::Export(ExportError::Io(_)) => "IO_ERROR",
        };

        ErrorResponse::new(code, error)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_codes_are_distinguishable() {
        let cases = [
            (SinkError::StorageUnavailable("x".into()), "STORAGE_UNAVAILABLE"),
            (SinkError::AlreadyOpen("x".into()), "ALREADY_OPEN"),
            (SinkError::NotFound("x".into()), "NOT_FOUND"),
            (
                SinkError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")),
                "IO_ERROR",
            ),
        ];
        for (error, code) in cases {
            assert_eq!(ErrorResponse::from(&error).code, code);
        }
    }

    #[test]
    fn test_recording_error_uses_storage_code() {
        let error = RecordingError::Storage(SinkError::AlreadyOpen("capture.webm".into()));
        let response = ErrorResponse::from(&error);
        assert_eq!(response.code, "ALREADY_OPEN");
        assert!(response.message.contains("capture.webm"));

        let app: ErrorResponse = AppError::from(error).into();
        assert_eq!(app.code, "ALREADY_OPEN");
    }

    #[test]
    fn test_scheduler_error_is_config_error() {
        let response: ErrorResponse = AppError::from(SchedulerError::ZeroInterval).into();
        assert_eq!(response.code, "CONFIG_ERROR");
    }
}
