//! Visible surface
//!
//! The front buffer is only written by the compositor, and only by swapping a
//! fully drawn back buffer in under the write lock. Readers therefore always
//! see a complete frame.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Contents of the front buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceImage {
    pub width: u32,
    pub height: u32,

    /// RGBA pixels
    pub data: Vec<u8>,

    /// Incremented on every blit; 0 means nothing has been drawn yet
    pub generation: u64,

    /// Timestamp of the camera frame shown
    pub frame_timestamp: Duration,
}

/// Read-only handle to the visible surface
#[derive(Clone, Default)]
pub struct SurfaceHandle {
    pub(crate) front: Arc<RwLock<SurfaceImage>>,
}

impl SurfaceHandle {
    /// Copy of the current image, or `None` before the first blit
    pub fn snapshot(&self) -> Option<SurfaceImage> {
        let front = self.front.read();
        if front.generation == 0 {
            return None;
        }
        Some(front.clone())
    }

    /// Copy the current pixels into `buf`, reusing its allocation
    ///
    /// Returns `(width, height, generation)`.
    pub fn read_into(&self, buf: &mut Vec<u8>) -> Option<(u32, u32, u64)> {
        let front = self.front.read();
        if front.generation == 0 {
            return None;
        }
        buf.clear();
        buf.extend_from_slice(&front.data);
        Some((front.width, front.height, front.generation))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let front = self.front.read();
        (front.width, front.height)
    }

    pub fn generation(&self) -> u64 {
        self.front.read().generation
    }
}
