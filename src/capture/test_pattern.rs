//! Synthetic frame source
//!
//! Produces a moving gradient so the pipeline can run without a camera.

use super::frame::{Frame, BYTES_PER_PIXEL};
use super::traits::FrameSource;
use std::sync::Arc;
use std::time::Instant;

/// Generates a fresh gradient frame on every pull
pub struct TestPatternSource {
    width: u32,
    height: u32,
    started: Instant,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            started: Instant::now(),
        }
    }

    fn render(&self) -> Frame {
        let timestamp = self.started.elapsed();
        // Scroll horizontally at ~60 px/s
        let offset = (timestamp.as_millis() / 16) as u64;
        let mut data = vec![0u8; Frame::expected_len(self.width, self.height)];

        for (i, px) in data.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = (i as u64 % self.width as u64) as u32;
            let y = (i as u64 / self.width as u64) as u32;
            px.copy_from_slice(&gradient(x, y, offset, self.width, self.height));
        }

        Frame::new(timestamp, self.width, self.height, data)
    }
}

/// Gradient color at `(x, y)` after scrolling `offset` pixels
fn gradient(x: u32, y: u32, offset: u64, width: u32, height: u32) -> [u8; 4] {
    let (w, h) = (width.max(1) as u64, height.max(1) as u64);
    let red = (x as u64).wrapping_add(offset) % w * 255 / w;
    let green = y as u64 % h * 255 / h;
    [red as u8, green as u8, 128, 255]
}

impl FrameSource for TestPatternSource {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(Arc::new(self.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_frames_are_valid() {
        let source = TestPatternSource::new(16, 8);
        let frame = source.current_frame().unwrap();
        assert!(frame.is_valid());
        assert_eq!(frame.pixel(0, 0).unwrap()[3], 255);
    }

    #[test]
    fn test_empty_pattern_yields_nothing() {
        assert!(TestPatternSource::new(0, 8).current_frame().is_none());
    }

    #[test]
    fn test_gradient_wraps_long_running_offset() {
        assert_eq!(gradient(0, 0, 0, 16, 8), [0, 0, 128, 255]);
        // Scrolling by the full width lands on the same column
        assert_eq!(gradient(3, 2, 16, 16, 8), gradient(3, 2, 0, 16, 8));
        let px = gradient(u32::MAX, u32::MAX, u64::MAX, u32::MAX, u32::MAX);
        assert_eq!(px[3], 255);
    }
}
