//! Detection types and the detector seam

use crate::capture::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One detected subject
///
/// Box coordinates are normalized to `0.0..=1.0` of the frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Detector confidence in `0.0..=1.0`
    pub confidence: f32,

    /// Estimated age in years, if the model provides one
    pub age: Option<f32>,
}

/// All detections computed from one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Timestamp of the frame the detections were computed from
    pub frame_timestamp: Duration,

    /// Detections in the order the detector reported them
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(frame_timestamp: Duration, detections: Vec<Detection>) -> Self {
        Self {
            frame_timestamp,
            detections,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Detection errors
///
/// These never leave the scheduler; they are logged and the previous
/// result stays visible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Detection failed: {0}")]
    Failed(String),

    #[error("Detection timed out after {0:?}")]
    TimedOut(Duration),
}

/// External face detector
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection over one frame
    async fn detect(&self, frame: Arc<Frame>) -> Result<DetectionResult, DetectorError>;
}

/// Detector that never finds anything
///
/// Lets the preview and recording path run when no model is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

#[async_trait]
impl Detector for NullDetector {
    async fn detect(&self, frame: Arc<Frame>) -> Result<DetectionResult, DetectorError> {
        Ok(DetectionResult::new(frame.timestamp, Vec::new()))
    }
}
