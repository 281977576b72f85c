//! FFmpeg surface encoder
//!
//! Samples the visible surface at the target frame rate, pipes raw RGBA
//! frames into an FFmpeg child and slices its stdout into chunks.

use super::channel::{chunk_channel, Chunk, RecordingError, RecordingResult, SurfaceEncoder};
use crate::export::MediaFormat;
use crate::render::SurfaceHandle;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// How long FFmpeg gets to drain after stdin closes
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const READ_BUFFER: usize = 64 * 1024;

struct EncoderSession {
    child: Child,
    stop_feeder: Option<oneshot::Sender<()>>,
    feeder: JoinHandle<u64>,
    reader: JoinHandle<()>,
}

pub struct FfmpegEncoder {
    format: MediaFormat,
    chunk_interval: Duration,
    session: Option<EncoderSession>,
}

impl FfmpegEncoder {
    /// `chunk_interval` is roughly how much media each chunk carries
    pub fn new(format: MediaFormat, chunk_interval: Duration) -> Self {
        Self {
            format,
            chunk_interval,
            session: None,
        }
    }

    /// Whether an `ffmpeg` binary can be run
    pub async fn is_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn args(&self, width: u32, height: u32, fps: u32) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgba",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend([
            "-video_size".to_string(),
            format!("{width}x{height}"),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
        ]);
        args.extend(self.format.ffmpeg_output_args().iter().map(|s| s.to_string()));
        args.push("-".to_string());
        args
    }
}

#[async_trait]
impl SurfaceEncoder for FfmpegEncoder {
    fn id(&self) -> &str {
        "ffmpeg"
    }

    fn format(&self) -> MediaFormat {
        self.format
    }

    async fn start(&mut self, surface: SurfaceHandle, fps: u32) -> RecordingResult<mpsc::Receiver<Chunk>> {
        if self.session.is_some() {
            return Err(RecordingError::Encoder("encoder already running".to_string()));
        }
        if fps == 0 {
            return Err(RecordingError::Encoder("frame rate must be positive".to_string()));
        }

        // Capture size is fixed by the first composited frame
        let (width, height) = surface.dimensions();
        if surface.generation() == 0 || width == 0 || height == 0 {
            return Err(RecordingError::Encoder(
                "surface has not been drawn yet".to_string(),
            ));
        }

        if !Self::is_available().await {
            return Err(RecordingError::EncoderUnavailable(
                "FFmpeg not found. Please install FFmpeg and make sure it is on PATH".to_string(),
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(self.args(width, height, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(RecordingError::Encoder("FFmpeg pipes unavailable".to_string()));
        };

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps, format={:?}",
            width,
            height,
            fps,
            self.format
        );

        let (stop_feeder, stop_rx) = oneshot::channel();
        let (tx, rx) = chunk_channel();

        let feeder = tokio::spawn(feed_frames(surface, stdin, (width, height), fps, stop_rx));
        let reader = tokio::spawn(read_chunks(stdout, tx, self.chunk_interval));

        self.session = Some(EncoderSession {
            child,
            stop_feeder: Some(stop_feeder),
            feeder,
            reader,
        });
        Ok(rx)
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if let Some(stop) = session.stop_feeder.take() {
            let _ = stop.send(());
        }
        let frames = session.feeder.await.unwrap_or(0);

        match timeout(DRAIN_TIMEOUT, session.child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                tracing::warn!("FFmpeg exited with status {}", status);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::warn!("FFmpeg did not exit in time, killing it");
                session.child.kill().await?;
            }
        }

        if timeout(DRAIN_TIMEOUT, &mut session.reader).await.is_err() {
            session.reader.abort();
        }

        tracing::info!("FFmpeg encoder finished: {} frames", frames);
        Ok(())
    }
}

/// Write surface snapshots to FFmpeg until told to stop; returns frames written
async fn feed_frames(
    surface: SurfaceHandle,
    mut stdin: ChildStdin,
    size: (u32, u32),
    fps: u32,
    mut stop: oneshot::Receiver<()>,
) -> u64 {
    let mut ticker = interval(Duration::from_secs_f64(1.0 / fps as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut buffer = Vec::new();
    let mut frames = 0u64;
    let mut warned = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        let Some((width, height, _)) = surface.read_into(&mut buffer) else {
            continue;
        };
        if (width, height) != size {
            if !warned {
                tracing::warn!(
                    "Surface resized to {}x{} during recording; dropping frames",
                    width,
                    height
                );
                warned = true;
            }
            continue;
        }

        if let Err(e) = stdin.write_all(&buffer).await {
            tracing::debug!("FFmpeg stdin closed: {}", e);
            break;
        }
        frames += 1;
    }

    // EOF lets FFmpeg flush and exit
    let _ = stdin.shutdown().await;
    frames
}

/// Slice FFmpeg output into sequenced chunks, one per interval
async fn read_chunks(mut stdout: ChildStdout, tx: mpsc::Sender<Chunk>, every: Duration) {
    let mut slice = interval(every);
    slice.set_missed_tick_behavior(MissedTickBehavior::Delay);
    slice.tick().await;

    let mut buffer = vec![0u8; READ_BUFFER];
    let mut pending = Vec::new();
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            read = stdout.read(&mut buffer) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buffer[..n]),
                Err(e) => {
                    tracing::warn!("Reading FFmpeg output failed: {}", e);
                    break;
                }
            },
            _ = slice.tick() => {
                if pending.is_empty() {
                    continue;
                }
                let chunk = Chunk::new(sequence, std::mem::take(&mut pending));
                if tx.send(chunk).await.is_err() {
                    tracing::debug!("Chunk receiver closed; dropping encoder output");
                    return;
                }
                sequence += 1;
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(Chunk::new(sequence, pending)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_describe_raw_input_and_stdout_output() {
        let encoder = FfmpegEncoder::new(MediaFormat::Webm, Duration::from_secs(1));
        let args = encoder.args(640, 480, 30);

        let size = args.iter().position(|a| a == "-video_size").unwrap();
        assert_eq!(args[size + 1], "640x480");
        assert!(args.contains(&"rgba".to_string()));
        assert!(args.contains(&"webm".to_string()));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[tokio::test]
    async fn test_start_requires_drawn_surface() {
        let mut encoder = FfmpegEncoder::new(MediaFormat::Webm, Duration::from_secs(1));
        let result = encoder.start(SurfaceHandle::default(), 30).await;
        assert!(matches!(result, Err(RecordingError::Encoder(_))));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut encoder = FfmpegEncoder::new(MediaFormat::Mp4, Duration::from_secs(1));
        encoder.stop().await.unwrap();
        assert_eq!(encoder.format(), MediaFormat::Mp4);
    }
}
