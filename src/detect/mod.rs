//! Face detection
//!
//! The detector itself is an external capability; this module owns the types
//! it produces, the shared latest-result state and the polling scheduler.

pub mod scheduler;
pub mod shared;
pub mod types;

pub use scheduler::{
    DetectionScheduler, SchedulerConfig, SchedulerError, SchedulerHandle, SchedulerStats,
};
pub use shared::SharedDetections;
pub use types::{Detection, DetectionResult, Detector, DetectorError, NullDetector};
