//! Pipeline assembly
//!
//! Builds the shared detection state, compositor, scheduler, recording
//! controller and exporter together, and tears them down together.

use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::detect::{DetectionScheduler, Detector, SchedulerHandle, SchedulerStats, SharedDetections};
use crate::export::{ExportResult, ExportedFile, Exporter};
use crate::recorder::{RecordingController, RecordingResult, RecordingState, SurfaceEncoder};
use crate::render::{Compositor, SurfaceHandle};
use crate::storage::PersistentSink;
use crate::utils::AppResult;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Pipeline {
    detections: Arc<SharedDetections>,
    compositor: Arc<Mutex<Compositor>>,
    surface: SurfaceHandle,
    scheduler: Option<SchedulerHandle>,
    recorder: Arc<RecordingController>,
    exporter: Exporter,
    sink_name: String,
}

impl Pipeline {
    /// Validate the config and start the detection loop
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: &AppConfig,
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn Detector>,
        sink: Arc<dyn PersistentSink>,
        encoder: Box<dyn SurfaceEncoder>,
    ) -> AppResult<Self> {
        config.validate()?;

        let detections = Arc::new(SharedDetections::new());
        let compositor = Arc::new(Mutex::new(Compositor::new(config.overlay)));
        let surface = compositor.lock().surface();

        let format = encoder.format();
        let recorder = Arc::new(RecordingController::new(
            config.recording.recorder_config(),
            surface.clone(),
            sink.clone(),
            encoder,
        ));
        let exporter = Exporter::new(sink, format);

        let scheduler = DetectionScheduler::new(
            config.detection.scheduler_config(),
            detector,
            source,
            compositor.clone(),
            detections.clone(),
        )
        .spawn()?;

        tracing::info!(
            "Pipeline started: detection every {}ms, recording to {}",
            config.detection.interval_ms,
            config.recording.sink_name()
        );

        Ok(Self {
            detections,
            compositor,
            surface,
            scheduler: Some(scheduler),
            recorder,
            exporter,
            sink_name: config.recording.sink_name(),
        })
    }

    /// Latest committed detections, shared with the scheduler
    pub fn detections(&self) -> &Arc<SharedDetections> {
        &self.detections
    }

    /// Read side of the visible surface
    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn recorder(&self) -> &Arc<RecordingController> {
        &self.recorder
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler
            .as_ref()
            .map(SchedulerHandle::stats)
            .unwrap_or_default()
    }

    pub async fn start_recording(&self) -> RecordingResult<()> {
        self.recorder.start().await
    }

    pub async fn stop_recording(&self) -> RecordingResult<RecordingState> {
        self.recorder.stop().await?;
        Ok(self.recorder.state())
    }

    /// Export the configured recording slot
    pub async fn export(&self) -> ExportResult<ExportedFile> {
        self.exporter.export(&self.sink_name).await
    }

    /// Stop recording, then the scheduler, then dispose the surface
    pub async fn shutdown(mut self) {
        self.recorder.shutdown().await;
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
        self.compositor.lock().dispose();
        self.detections.clear();
        tracing::info!("Pipeline shut down");
    }
}
