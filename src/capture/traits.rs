//! Capture trait definitions
//!
//! Source-agnostic traits and device descriptions for frame capture.

use super::frame::Frame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Anything that can hand out the most recent camera frame
///
/// Push-style producers publish into a [`FrameSlot`](super::FrameSlot), which
/// implements this trait, so the scheduler only ever pulls.
pub trait FrameSource: Send + Sync {
    /// Latest available frame, or `None` before the first frame arrives
    fn current_frame(&self) -> Option<Arc<Frame>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        (**self).current_frame()
    }
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Resolutions offered for every camera
    pub const COMMON: [Resolution; 3] = [
        Resolution {
            width: 1280,
            height: 720,
        },
        Resolution {
            width: 640,
            height: 480,
        },
        Resolution {
            width: 320,
            height: 240,
        },
    ];
}
