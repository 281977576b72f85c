//! Webcam capture using nokhwa
//!
//! The camera is driven from a dedicated thread because nokhwa blocks until
//! the device delivers the next frame. Decoded RGBA frames are published into
//! a [`FrameSlot`] that the scheduler pulls from.

use super::frame::Frame;
use super::slot::FrameSlot;
use super::traits::{CameraInfo, Resolution};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    supported_resolutions: Resolution::COMMON.to_vec(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Camera-backed frame producer
pub struct WebcamSource {
    device_id: Option<String>,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WebcamSource {
    /// Create a source for the given device (None = first camera)
    pub fn new(device_id: Option<String>, slot: Arc<FrameSlot>) -> Self {
        Self {
            device_id,
            slot,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    fn camera_index(&self) -> CameraIndex {
        match &self.device_id {
            Some(id) => match id.parse::<u32>() {
                Ok(idx) => CameraIndex::Index(idx),
                Err(_) => CameraIndex::String(id.clone()),
            },
            None => CameraIndex::Index(0),
        }
    }

    /// Start the capture thread
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let index = self.camera_index();
        let slot = self.slot.clone();
        let running = self.running.clone();

        self.thread = Some(std::thread::spawn(move || {
            let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

            let mut camera = match Camera::new(index.clone(), format) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                tracing::error!("Failed to open camera stream: {:?}", e);
                running.store(false, Ordering::SeqCst);
                return;
            }

            let camera_format = camera.camera_format();
            tracing::info!(
                "Webcam opened: {}x{} @ {}fps, format={:?}",
                camera_format.resolution().width(),
                camera_format.resolution().height(),
                camera_format.frame_rate(),
                camera_format.format()
            );

            let started = Instant::now();
            while running.load(Ordering::SeqCst) {
                // Blocks until the camera delivers the next frame
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        tracing::debug!("Failed to capture frame: {:?}", e);
                        continue;
                    }
                };

                match buffer.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let (width, height) = (image.width(), image.height());
                        slot.publish(Frame::new(started.elapsed(), width, height, image.into_raw()));
                    }
                    Err(e) => tracing::debug!("Failed to decode frame: {:?}", e),
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            slot.clear();
            tracing::info!("Webcam capture thread stopped");
        }));
    }

    /// Whether the capture thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the capture thread and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.stop();
    }
}
