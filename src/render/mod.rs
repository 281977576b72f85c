//! Compositing onto the visible surface

pub mod compositor;
pub mod surface;

pub use compositor::{Compositor, CompositorError, OverlayStyle};
pub use surface::{SurfaceHandle, SurfaceImage};
