//! `facelens [config.json]`
//!
//! Runs the pipeline, records for the configured time and exports the result.

use anyhow::{bail, Context};
use facelens::capture::FrameSource;
use facelens::detect::NullDetector;
use facelens::recorder::{FfmpegEncoder, RecordingState};
use facelens::storage::FileSink;
use facelens::{AppConfig, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "webcam")]
fn frame_source(config: &AppConfig) -> (Arc<dyn FrameSource>, Option<facelens::capture::webcam::WebcamSource>) {
    use facelens::capture::webcam::WebcamSource;
    use facelens::capture::FrameSlot;

    let slot = Arc::new(FrameSlot::new());
    let mut webcam = WebcamSource::new(config.capture.device_id.clone(), slot.clone());
    webcam.start();
    let source: Arc<dyn FrameSource> = slot;
    (source, Some(webcam))
}

#[cfg(not(feature = "webcam"))]
fn frame_source(config: &AppConfig) -> (Arc<dyn FrameSource>, Option<()>) {
    use facelens::capture::TestPatternSource;

    tracing::info!("Built without webcam support, using a test pattern");
    let source = TestPatternSource::new(config.capture.width, config.capture.height);
    (Arc::new(source), None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    facelens::init_tracing();
    tracing::info!("Starting FaceLens v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("facelens.json"));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let (source, _camera) = frame_source(&config);
    let sink = Arc::new(FileSink::new(&config.recording.storage_dir));
    if sink.recover(&config.recording.sink_name()).await? {
        tracing::warn!("Recovered an unfinished recording from a previous run");
    }

    let encoder = FfmpegEncoder::new(config.recording.format, config.recording.chunk_interval());
    let pipeline = Pipeline::start(
        &config,
        source,
        Arc::new(NullDetector),
        sink,
        Box::new(encoder),
    )?;

    // Give the scheduler a chance to draw the first frame
    let wait = tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.surface().generation() == 0 {
            tokio::time::sleep(config.detection.scheduler_config().interval).await;
        }
    });
    if wait.await.is_err() {
        pipeline.shutdown().await;
        bail!("no camera frame arrived within 5s");
    }

    if let Err(e) = pipeline.start_recording().await {
        pipeline.shutdown().await;
        return Err(e).context("starting recording");
    }

    tracing::info!("Recording for {}s (Ctrl-C stops early)", config.session.record_seconds);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(config.session.record_seconds)) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    let stopped = pipeline.stop_recording().await;
    let session = pipeline.recorder().session();
    match stopped {
        Ok(RecordingState::Stopped) => {
            let exported = pipeline
                .exporter()
                .export_to_dir(pipeline.sink_name(), &config.session.export_dir)
                .await;
            let path = match exported {
                Ok(path) => path,
                Err(e) => {
                    pipeline.shutdown().await;
                    return Err(e).context("exporting recording");
                }
            };
            if let Some(session) = session {
                tracing::info!(
                    "Recorded {} chunks ({} bytes) in {}ms",
                    session.chunk_count,
                    session.bytes_written,
                    session.duration_ms()
                );
            }
            println!("{}", path.display());
        }
        Ok(state) => {
            let error = pipeline.recorder().last_error();
            pipeline.shutdown().await;
            bail!("recording ended in state {:?}: {:?}", state, error);
        }
        Err(e) => {
            pipeline.shutdown().await;
            return Err(e).context("stopping recording");
        }
    }

    pipeline.shutdown().await;
    Ok(())
}
