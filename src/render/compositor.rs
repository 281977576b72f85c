//! Double-buffered compositor
//!
//! Each render copies the camera frame into the back buffer, draws detection
//! overlays on top and then swaps the back buffer into the visible surface.

use super::surface::{SurfaceHandle, SurfaceImage};
use crate::capture::frame::{Frame, BYTES_PER_PIXEL};
use crate::detect::{Detection, DetectionResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compositor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    #[error("Render called on a disposed surface")]
    Disposed,

    #[error("Invalid frame: {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },
}

/// How detection overlays are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayStyle {
    /// Stroke color (RGBA)
    pub color: [u8; 4],

    /// Box outline thickness in pixels
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [0, 255, 0, 255],
            thickness: 3,
        }
    }
}

/// Ages are drawn as a meter relative to this value
const AGE_METER_MAX_YEARS: f32 = 100.0;

pub struct Compositor {
    back: Vec<u8>,
    width: u32,
    height: u32,
    front: SurfaceHandle,
    style: OverlayStyle,
    disposed: bool,
    resizes: u64,
}

impl Compositor {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            back: Vec::new(),
            width: 0,
            height: 0,
            front: SurfaceHandle::default(),
            style,
            disposed: false,
            resizes: 0,
        }
    }

    /// Handle to the visible surface
    pub fn surface(&self) -> SurfaceHandle {
        self.front.clone()
    }

    /// Current buffer dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of buffer reallocations so far
    pub fn resize_count(&self) -> u64 {
        self.resizes
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the buffers; any later render is an error
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.back = Vec::new();
        tracing::debug!("Compositor disposed");
    }

    /// Composite one frame plus overlays onto the visible surface
    pub fn render(&mut self, frame: &Frame, result: Option<&DetectionResult>) -> Result<(), CompositorError> {
        if self.disposed {
            tracing::error!("Render on disposed compositor");
            return Err(CompositorError::Disposed);
        }

        if !frame.is_valid() {
            return Err(CompositorError::InvalidFrame {
                width: frame.width,
                height: frame.height,
                len: frame.data.len(),
            });
        }

        if (frame.width, frame.height) != (self.width, self.height) {
            self.resize(frame.width, frame.height);
        }

        self.back.copy_from_slice(&frame.data);

        if let Some(result) = result {
            for detection in &result.detections {
                self.draw_detection(detection);
            }
        }

        self.blit(frame);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        tracing::info!(
            "Resizing compositor buffers {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        self.width = width;
        self.height = height;
        self.back = vec![0; Frame::expected_len(width, height)];
        self.resizes += 1;
    }

    /// Swap the back buffer into the front surface in one step
    fn blit(&mut self, frame: &Frame) {
        let mut front = self.front.front.write();
        let SurfaceImage {
            width,
            height,
            data,
            generation,
            frame_timestamp,
        } = &mut *front;

        std::mem::swap(data, &mut self.back);
        *width = self.width;
        *height = self.height;
        *generation += 1;
        *frame_timestamp = frame.timestamp;

        // The old front buffer had the previous size
        if self.back.len() != data.len() {
            self.back = vec![0; data.len()];
        }
    }

    fn draw_detection(&mut self, detection: &Detection) {
        let (w, h) = (self.width as f32, self.height as f32);
        let x0 = (detection.x.clamp(0.0, 1.0) * w) as u32;
        let y0 = (detection.y.clamp(0.0, 1.0) * h) as u32;
        let x1 = ((detection.x + detection.width).clamp(0.0, 1.0) * w) as u32;
        let y1 = ((detection.y + detection.height).clamp(0.0, 1.0) * h) as u32;

        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let t = self.style.thickness.max(1);
        let color = self.style.color;

        // Outline
        self.fill_rect(x0, y0, x1, y0.saturating_add(t).min(y1), color);
        self.fill_rect(x0, y1.saturating_sub(t).max(y0), x1, y1, color);
        self.fill_rect(x0, y0, x0.saturating_add(t).min(x1), y1, color);
        self.fill_rect(x1.saturating_sub(t).max(x0), y0, x1, y1, color);

        // Age meter just above the box, or inside it at the top edge
        if let Some(age) = detection.age {
            let fraction = (age / AGE_METER_MAX_YEARS).clamp(0.0, 1.0);
            let meter_end = x0 + ((x1 - x0) as f32 * fraction) as u32;
            let meter_h = t.saturating_mul(2);
            let (my0, my1) = if y0 >= meter_h {
                (y0 - meter_h, y0)
            } else {
                (y0, y0.saturating_add(meter_h).min(y1))
            };
            self.fill_rect(x0, my0, meter_end, my1, color);
        }
    }

    /// Alpha-blend a color over `[x0, x1) x [y0, y1)` of the back buffer
    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 4]) {
        let src_a = color[3] as f32 / 255.0;
        if src_a < 0.01 {
            return;
        }

        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
                let Some(px) = self.back.get_mut(idx..idx + BYTES_PER_PIXEL) else {
                    continue;
                };
                for c in 0..3 {
                    let out = color[c] as f32 * src_a + px[c] as f32 * (1.0 - src_a);
                    px[c] = out.clamp(0.0, 255.0) as u8;
                }
                px[3] = 255;
            }
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::filled(Duration::from_millis(5), width, height, [10, 20, 30, 255])
    }

    fn face(age: Option<f32>) -> Detection {
        Detection {
            x: 0.25,
            y: 0.25,
            width: 0.5,
            height: 0.5,
            confidence: 0.9,
            age,
        }
    }

    #[test]
    fn test_render_publishes_frame() {
        let mut compositor = Compositor::default();
        let surface = compositor.surface();
        assert!(surface.snapshot().is_none());

        compositor.render(&frame(8, 8), None).unwrap();

        let image = surface.snapshot().unwrap();
        assert_eq!((image.width, image.height), (8, 8));
        assert_eq!(image.generation, 1);
        assert_eq!(image.frame_timestamp, Duration::from_millis(5));
        assert!(image.data.chunks(4).all(|px| px == [10, 20, 30, 255]));
    }

    #[test]
    fn test_overlay_draws_box_outline() {
        let mut compositor = Compositor::new(OverlayStyle {
            color: [255, 0, 0, 255],
            thickness: 1,
        });
        let surface = compositor.surface();
        let result = DetectionResult::new(Duration::ZERO, vec![face(None)]);

        compositor.render(&frame(40, 40), Some(&result)).unwrap();
        let image = surface.snapshot().unwrap();
        let at = |x: usize, y: usize| {
            let i = (y * 40 + x) * 4;
            [image.data[i], image.data[i + 1], image.data[i + 2], image.data[i + 3]]
        };

        // Box spans 10..30 on both axes
        assert_eq!(at(10, 10), [255, 0, 0, 255]);
        assert_eq!(at(29, 20), [255, 0, 0, 255]);
        // Interior and exterior keep the camera pixels
        assert_eq!(at(20, 20), [10, 20, 30, 255]);
        assert_eq!(at(2, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn test_age_meter_scales_with_age() {
        let mut compositor = Compositor::new(OverlayStyle {
            color: [0, 0, 255, 255],
            thickness: 1,
        });
        let surface = compositor.surface();
        let result = DetectionResult::new(Duration::ZERO, vec![face(Some(50.0))]);

        compositor.render(&frame(40, 40), Some(&result)).unwrap();
        let image = surface.snapshot().unwrap();
        let row = 9; // meter sits directly above the box
        let blue = |x: usize| image.data[(row * 40 + x) * 4 + 2] == 255;

        assert!(blue(10));
        assert!(blue(19));
        assert!(!blue(21));
    }

    #[test]
    fn test_resize_only_when_dimensions_change() {
        let mut compositor = Compositor::default();
        compositor.render(&frame(4, 4), None).unwrap();
        compositor.render(&frame(4, 4), None).unwrap();
        compositor.render(&frame(4, 4), None).unwrap();
        assert_eq!(compositor.resize_count(), 1);

        compositor.render(&frame(6, 2), None).unwrap();
        assert_eq!(compositor.resize_count(), 2);
        assert_eq!(compositor.surface().dimensions(), (6, 2));

        // The recycled back buffer must match the new size
        compositor.render(&frame(6, 2), None).unwrap();
        assert_eq!(compositor.surface().snapshot().unwrap().data.len(), 48);
    }

    #[test]
    fn test_render_after_dispose_fails() {
        let mut compositor = Compositor::default();
        compositor.dispose();
        assert_eq!(compositor.render(&frame(4, 4), None), Err(CompositorError::Disposed));
    }

    #[test]
    fn test_invalid_frame_rejected() {
        let mut compositor = Compositor::default();
        let bad = Frame::new(Duration::ZERO, 4, 4, vec![0; 3]);
        assert!(matches!(
            compositor.render(&bad, None),
            Err(CompositorError::InvalidFrame { .. })
        ));
        assert!(compositor.surface().snapshot().is_none());
    }

    #[test]
    fn test_huge_thickness_fills_box_only() {
        let mut compositor = Compositor::new(OverlayStyle {
            color: [0, 255, 0, 255],
            thickness: u32::MAX,
        });
        let surface = compositor.surface();
        let result = DetectionResult::new(Duration::ZERO, vec![face(Some(80.0))]);

        compositor.render(&frame(40, 40), Some(&result)).unwrap();
        let image = surface.snapshot().unwrap();
        let at = |x: usize, y: usize| {
            let i = (y * 40 + x) * 4;
            [image.data[i], image.data[i + 1], image.data[i + 2], image.data[i + 3]]
        };

        assert_eq!(at(20, 20), [0, 255, 0, 255]);
        assert_eq!(at(10, 10), [0, 255, 0, 255]);
        assert_eq!(at(2, 2), [10, 20, 30, 255]);
        assert_eq!(at(35, 35), [10, 20, 30, 255]);
    }
}
