//! Latest-frame slot
//!
//! Bridges push-style producers (a camera thread) and the pull-style
//! scheduler. Only the newest frame is kept; older frames are dropped.

use super::frame::Frame;
use super::traits::FrameSource;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Holds the most recently published frame
#[derive(Default)]
pub struct FrameSlot {
    latest: RwLock<Option<Arc<Frame>>>,
    published: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: Frame) {
        *self.latest.write() = Some(Arc::new(frame));
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of frames published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Drop the current frame, e.g. when the camera goes away
    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl FrameSource for FrameSlot {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.latest.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_slot_keeps_latest_frame() {
        let slot = FrameSlot::new();
        assert!(slot.current_frame().is_none());

        slot.publish(Frame::filled(Duration::from_millis(1), 2, 2, [0; 4]));
        slot.publish(Frame::filled(Duration::from_millis(2), 2, 2, [9; 4]));

        let frame = slot.current_frame().unwrap();
        assert_eq!(frame.timestamp, Duration::from_millis(2));
        assert_eq!(slot.published(), 2);

        slot.clear();
        assert!(slot.current_frame().is_none());
    }
}
