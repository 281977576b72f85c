//! Frame capture
//!
//! Frame types, the pull-based [`FrameSource`] seam and the concrete sources.

pub mod frame;
pub mod slot;
pub mod test_pattern;
pub mod traits;

#[cfg(feature = "webcam")]
pub mod webcam;

pub use frame::Frame;
pub use slot::FrameSlot;
pub use test_pattern::TestPatternSource;
pub use traits::{CameraInfo, FrameSource, Resolution};
