//! Captured frame types
//!
//! Frames are immutable once produced. They are shared between the scheduler,
//! the detector and the compositor behind an `Arc`.

use std::time::Duration;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured image in tightly packed RGBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Capture time relative to the start of the source
    pub timestamp: Duration,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// RGBA pixel data, `width * height * 4` bytes
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw RGBA data
    pub fn new(timestamp: Duration, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            width,
            height,
            data,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(timestamp: Duration, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(Self::expected_len(width, height))
            .collect();
        Self::new(timestamp, width, height, data)
    }

    /// Number of bytes an RGBA frame of the given size occupies
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Whether the pixel buffer matches the declared dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == Self::expected_len(self.width, self.height)
    }

    /// RGBA value at a pixel, if inside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(idx..idx + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}
