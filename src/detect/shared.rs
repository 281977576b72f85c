//! Shared detection state
//!
//! One instance is created per pipeline and handed to the scheduler (writer)
//! and to any reader. Results are swapped wholesale, never edited in place.

use super::types::DetectionResult;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct SharedDetections {
    current: RwLock<Option<Arc<DetectionResult>>>,
    version: AtomicU64,
}

impl SharedDetections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently committed result
    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.current.read().clone()
    }

    /// Replace the current result and return the committed value
    pub fn replace(&self, result: DetectionResult) -> Arc<DetectionResult> {
        let result = Arc::new(result);
        *self.current.write() = Some(result.clone());
        self.version.fetch_add(1, Ordering::Release);
        result
    }

    /// Number of results committed so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_replace_swaps_whole_result() {
        let shared = SharedDetections::new();
        assert!(shared.latest().is_none());

        let first = shared.replace(DetectionResult::new(Duration::from_millis(1), vec![]));
        let second = shared.replace(DetectionResult::new(Duration::from_millis(2), vec![]));

        // Readers holding the old result keep seeing it unchanged
        assert_eq!(first.frame_timestamp, Duration::from_millis(1));
        assert_eq!(shared.latest().unwrap().frame_timestamp, second.frame_timestamp);
        assert_eq!(shared.version(), 2);
    }
}
