//! Detection scheduler
//!
//! Fixed-cadence loop that pulls the current frame, starts a detection when
//! none is in flight, and composites every tick with the newest committed
//! result. Detections run as their own tasks so a slow detector never delays
//! a draw.

use super::shared::SharedDetections;
use super::types::{DetectionResult, Detector, DetectorError};
use crate::capture::{Frame, FrameSource};
use crate::render::Compositor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Scheduler setup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler interval must be positive")]
    ZeroInterval,
}

/// Scheduler timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Tick period
    pub interval: Duration,

    /// Upper bound for a single `detect()` call; `None` waits forever
    pub detect_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            detect_timeout: Some(Duration::from_secs(2)),
        }
    }
}

/// Counters exposed for monitoring and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    /// Ticks that found a detection still running
    pub skipped: u64,
    pub detections_started: u64,
    pub detections_committed: u64,
    pub detections_failed: u64,
    /// Results that arrived after cancellation and were dropped
    pub detections_discarded: u64,
    pub composites: u64,
    pub composite_errors: u64,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    skipped: AtomicU64,
    detections_started: AtomicU64,
    detections_committed: AtomicU64,
    detections_failed: AtomicU64,
    detections_discarded: AtomicU64,
    composites: AtomicU64,
    composite_errors: AtomicU64,
}

/// State shared between the loop, detection tasks and the handle
#[derive(Default)]
struct Control {
    cancelled: AtomicBool,
    /// Held while checking `cancelled` and committing, so nothing lands after cancel
    commit_gate: Mutex<()>,
    wake: Notify,
    in_flight: AtomicBool,
    counters: Counters,
}

impl Control {
    fn cancel(&self) {
        let _gate = self.commit_gate.lock();
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Drives detection and compositing for one pipeline
pub struct DetectionScheduler {
    config: SchedulerConfig,
    detector: Arc<dyn Detector>,
    source: Arc<dyn FrameSource>,
    compositor: Arc<Mutex<Compositor>>,
    detections: Arc<SharedDetections>,
}

impl DetectionScheduler {
    pub fn new(
        config: SchedulerConfig,
        detector: Arc<dyn Detector>,
        source: Arc<dyn FrameSource>,
        compositor: Arc<Mutex<Compositor>>,
        detections: Arc<SharedDetections>,
    ) -> Self {
        Self {
            config,
            detector,
            source,
            compositor,
            detections,
        }
    }

    /// Start ticking on the current runtime
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> Result<SchedulerHandle, SchedulerError> {
        if self.config.interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let control = Arc::new(Control::default());
        let task = tokio::spawn(self.run(control.clone()));

        Ok(SchedulerHandle {
            control,
            task: Some(task),
        })
    }

    async fn run(self, control: Arc<Control>) {
        tracing::info!("Detection scheduler started (interval {:?})", self.config.interval);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = control.wake.notified() => {}
                _ = ticker.tick() => {}
            }

            if control.is_cancelled() {
                break;
            }
            self.tick(&control);
        }

        tracing::info!("Detection scheduler stopped");
    }

    fn tick(&self, control: &Arc<Control>) {
        let counters = &control.counters;
        counters.ticks.fetch_add(1, Ordering::Relaxed);

        let Some(frame) = self.source.current_frame() else {
            tracing::trace!("No frame available yet");
            return;
        };

        if control
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            counters.detections_started.fetch_add(1, Ordering::Relaxed);
            self.start_detection(frame.clone(), control.clone());
        } else {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
        }

        let latest = self.detections.latest();
        composite(&self.compositor, &frame, latest.as_deref(), control);
    }

    fn start_detection(&self, frame: Arc<Frame>, control: Arc<Control>) {
        let detector = self.detector.clone();
        let source = self.source.clone();
        let compositor = self.compositor.clone();
        let detections = self.detections.clone();
        let timeout = self.config.detect_timeout;

        tokio::spawn(async move {
            // Clears the slot even if the detector panics
            let _in_flight = InFlightGuard(control.clone());

            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, detector.detect(frame.clone()))
                    .await
                    .unwrap_or(Err(DetectorError::TimedOut(limit))),
                None => detector.detect(frame.clone()).await,
            };

            {
                let _gate = control.commit_gate.lock();
                let counters = &control.counters;

                if control.is_cancelled() {
                    tracing::debug!("Discarding detection result after cancellation");
                    counters.detections_discarded.fetch_add(1, Ordering::Relaxed);
                } else {
                    match outcome {
                        Ok(result) => {
                            let result = detections.replace(result);
                            counters.detections_committed.fetch_add(1, Ordering::Relaxed);

                            // Draw the freshest frame, not necessarily the one detected on
                            let current = source.current_frame().unwrap_or(frame);
                            composite(&compositor, &current, Some(&result), &control);
                        }
                        Err(e) => {
                            counters.detections_failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!("{}; keeping previous result", e);
                        }
                    }
                }
            }
        });
    }
}

struct InFlightGuard(Arc<Control>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

fn composite(
    compositor: &Mutex<Compositor>,
    frame: &Frame,
    result: Option<&DetectionResult>,
    control: &Control,
) {
    match compositor.lock().render(frame, result) {
        Ok(()) => {
            control.counters.composites.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            control.counters.composite_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Composite failed: {}", e);
        }
    }
}

/// Cancellable handle to a running scheduler
pub struct SchedulerHandle {
    control: Arc<Control>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop future ticks; a running detection finishes but is not committed
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    /// Cancel and wait for the tick loop to exit
    pub async fn stop(mut self) {
        self.control.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Scheduler task failed: {}", e);
            }
        }
    }

    /// Whether a `detect()` call is currently running
    pub fn detection_in_flight(&self) -> bool {
        self.control.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.control.counters;
        SchedulerStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            detections_started: c.detections_started.load(Ordering::Relaxed),
            detections_committed: c.detections_committed.load(Ordering::Relaxed),
            detections_failed: c.detections_failed.load(Ordering::Relaxed),
            detections_discarded: c.detections_discarded.load(Ordering::Relaxed),
            composites: c.composites.load(Ordering::Relaxed),
            composite_errors: c.composite_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.control.cancel();
    }
}
