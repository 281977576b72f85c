//! Recording controller
//!
//! Owns the recording lifecycle: opens the sink, starts the encoder, hands
//! chunks to the sink writer and settles into `Stopped` or `Errored`.

use super::channel::{RecordingError, RecordingResult, SurfaceEncoder};
use super::state::{RecordingConfig, RecordingSession, RecordingState};
use super::writer::SinkWriter;
use crate::render::SurfaceHandle;
use crate::storage::{OpenOptions, PersistentSink};
use crate::utils::ErrorResponse;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// State machine moved
    StateChanged(RecordingState),
    /// A chunk was durably appended
    ChunkWritten { sequence: u64, bytes_written: u64 },
    /// Error occurred
    Error(ErrorResponse),
}

/// State visible to both the controller and its writer task
pub(crate) struct ControllerShared {
    state: RwLock<RecordingState>,
    last_error: RwLock<Option<ErrorResponse>>,
    session: RwLock<Option<RecordingSession>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl ControllerShared {
    fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: RwLock::new(RecordingState::Idle),
            last_error: RwLock::new(None),
            session: RwLock::new(None),
            event_tx,
        }
    }

    pub(crate) fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, next: RecordingState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous == next {
            return;
        }
        self.sync_session(next);
        tracing::info!("Recording state: {:?} -> {:?}", previous, next);
        let _ = self.event_tx.send(RecordingEvent::StateChanged(next));
    }

    /// Move to `to` only if currently in `from`
    fn transition(&self, from: RecordingState, to: RecordingState) -> bool {
        {
            let mut state = self.state.write();
            if *state != from {
                return false;
            }
            *state = to;
        }
        self.sync_session(to);
        tracing::info!("Recording state: {:?} -> {:?}", from, to);
        let _ = self.event_tx.send(RecordingEvent::StateChanged(to));
        true
    }

    fn sync_session(&self, state: RecordingState) {
        if let Some(session) = self.session.write().as_mut() {
            session.state = state;
            if state.is_terminal() && session.ended_at.is_none() {
                session.ended_at = Some(Utc::now());
            }
        }
    }

    /// Record a fatal error and enter `Errored`
    pub(crate) fn fail(&self, error: &RecordingError) {
        tracing::error!("Recording failed: {}", error);
        let response = ErrorResponse::from(error);
        *self.last_error.write() = Some(response.clone());
        let _ = self.event_tx.send(RecordingEvent::Error(response));
        self.set_state(RecordingState::Errored);
    }

    pub(crate) fn chunk_written(&self, sequence: u64, len: usize, bytes_written: u64) {
        if let Some(session) = self.session.write().as_mut() {
            session.record_chunk(len);
        }
        tracing::debug!("Appended chunk {} ({} bytes)", sequence, len);
        let _ = self.event_tx.send(RecordingEvent::ChunkWritten {
            sequence,
            bytes_written,
        });
    }
}

struct ActiveRecording {
    stop_tx: Option<oneshot::Sender<()>>,
    writer: JoinHandle<RecordingResult<()>>,
}

struct Lifecycle {
    encoder: Box<dyn SurfaceEncoder>,
    active: Option<ActiveRecording>,
}

/// Turns the visible surface into a persisted recording
pub struct RecordingController {
    config: RecordingConfig,
    surface: SurfaceHandle,
    sink: Arc<dyn PersistentSink>,
    shared: Arc<ControllerShared>,

    /// Serializes start/stop; held across their awaits
    lifecycle: Mutex<Lifecycle>,
}

impl RecordingController {
    pub fn new(
        config: RecordingConfig,
        surface: SurfaceHandle,
        sink: Arc<dyn PersistentSink>,
        encoder: Box<dyn SurfaceEncoder>,
    ) -> Self {
        Self {
            config,
            surface,
            sink,
            shared: Arc::new(ControllerShared::new()),
            lifecycle: Mutex::new(Lifecycle {
                encoder,
                active: None,
            }),
        }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    /// Error that put the controller into `Errored`
    pub fn last_error(&self) -> Option<ErrorResponse> {
        self.shared.last_error.read().clone()
    }

    /// Snapshot of the current or most recent session
    pub fn session(&self) -> Option<RecordingSession> {
        self.shared.session.read().clone()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Start recording
    ///
    /// Does nothing while a session is in progress. From `Stopped` or
    /// `Errored` a new session replaces the previous one.
    pub async fn start(&self) -> RecordingResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        let current = self.state();
        if current.is_active() {
            tracing::debug!("Start ignored in state {:?}", current);
            return Ok(());
        }

        Self::release(&mut lifecycle).await;

        *self.shared.last_error.write() = None;
        *self.shared.session.write() = Some(RecordingSession::new(&self.config.sink_name));
        self.shared.set_state(RecordingState::Requesting);

        tracing::info!(
            "Starting recording to {} with {}",
            self.config.sink_name,
            lifecycle.encoder.id()
        );

        let mut handle = match self
            .sink
            .open(&self.config.sink_name, OpenOptions::create())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let error = RecordingError::from(e);
                self.shared.fail(&error);
                return Err(error);
            }
        };

        let chunks = match lifecycle
            .encoder
            .start(self.surface.clone(), self.config.fps)
            .await
        {
            Ok(chunks) => chunks,
            Err(error) => {
                if let Err(e) = self.sink.abort(&mut handle).await {
                    tracing::warn!("Failed to release sink {}: {}", handle.name(), e);
                }
                self.shared.fail(&error);
                return Err(error);
            }
        };

        // Entered before the writer exists so a fast failure cannot be overwritten
        self.shared.set_state(RecordingState::Recording);

        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = SinkWriter::new(
            self.sink.clone(),
            handle,
            chunks,
            stop_rx,
            self.shared.clone(),
        );
        lifecycle.active = Some(ActiveRecording {
            stop_tx: Some(stop_tx),
            writer: tokio::spawn(writer.run()),
        });

        Ok(())
    }

    /// Stop recording and finalize the sink
    ///
    /// The encoder is stopped first and everything it flushed is written;
    /// resolves once the sink is finalized, with no append afterwards.
    pub async fn stop(&self) -> RecordingResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        if !self
            .shared
            .transition(RecordingState::Recording, RecordingState::Stopping)
        {
            tracing::debug!("Stop ignored in state {:?}", self.state());
            // A session that failed on its own still holds the encoder
            Self::release(&mut lifecycle).await;
            return Ok(());
        }

        let Some(mut active) = lifecycle.active.take() else {
            let error = RecordingError::Encoder("no active recording to stop".to_string());
            self.shared.fail(&error);
            return Err(error);
        };

        if let Err(e) = lifecycle.encoder.stop().await {
            tracing::warn!("Encoder {} did not stop cleanly: {}", lifecycle.encoder.id(), e);
        }

        if let Some(stop_tx) = active.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match active.writer.await {
            Ok(result) => result,
            Err(e) => {
                let error = RecordingError::Encoder(format!("sink writer task failed: {e}"));
                self.shared.fail(&error);
                Err(error)
            }
        }
    }

    /// Stop any session and release the encoder
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop().await {
            tracing::warn!("Recording ended with error during shutdown: {}", e);
        }
        let mut lifecycle = self.lifecycle.lock().await;
        Self::release(&mut lifecycle).await;
    }

    /// Tear down what a failed session left running
    async fn release(lifecycle: &mut Lifecycle) {
        let Some(mut active) = lifecycle.active.take() else {
            return;
        };
        if let Err(e) = lifecycle.encoder.stop().await {
            tracing::debug!("Encoder stop during release: {}", e);
        }
        if let Some(stop_tx) = active.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Ok(Err(e)) = active.writer.await {
            tracing::debug!("Previous session ended with: {}", e);
        }
    }
}
