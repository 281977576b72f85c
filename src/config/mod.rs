//! Application configuration
//!
//! JSON file with one section per subsystem. Every field has a default, so a
//! partial file (or none at all) is a valid configuration.

use crate::detect::SchedulerConfig;
use crate::export::MediaFormat;
use crate::recorder::RecordingConfig;
use crate::render::OverlayStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    pub interval_ms: u64,
    /// `null` lets a detection run forever
    pub timeout_ms: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            timeout_ms: Some(2000),
        }
    }
}

impl DetectionConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_millis(self.interval_ms),
            detect_timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingOptions {
    /// Directory the file sink writes into
    pub storage_dir: PathBuf,
    /// Recording slot; the file is `<slotName>.<format extension>`
    pub slot_name: String,
    pub format: MediaFormat,
    pub fps: u32,
    /// Media time per chunk handed to storage
    pub chunk_interval_ms: u64,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("recordings"),
            slot_name: "capture".to_string(),
            format: MediaFormat::default(),
            fps: 30,
            chunk_interval_ms: 1000,
        }
    }
}

impl RecordingOptions {
    pub fn sink_name(&self) -> String {
        format!("{}.{}", self.slot_name, self.format.extension())
    }

    pub fn recorder_config(&self) -> RecordingConfig {
        RecordingConfig {
            sink_name: self.sink_name(),
            fps: self.fps,
        }
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Camera index or name; `None` picks the first camera
    pub device_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// What the `facelens` binary does once the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub record_seconds: u64,
    pub export_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_seconds: 5,
            export_dir: PathBuf::from("exports"),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub recording: RecordingOptions,
    pub overlay: OverlayStyle,
    pub capture: CaptureConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Read a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.interval_ms == 0 {
            return Err(ConfigError::Invalid("detection.intervalMs must be positive".into()));
        }
        if self.detection.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("detection.timeoutMs must be positive".into()));
        }
        if self.recording.fps == 0 || self.capture.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        if self.recording.chunk_interval_ms == 0 {
            return Err(ConfigError::Invalid("recording.chunkIntervalMs must be positive".into()));
        }
        if self.recording.slot_name.trim().is_empty() {
            return Err(ConfigError::Invalid("recording.slotName must not be empty".into()));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Invalid("capture size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("facelens.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.recording.sink_name(), "capture.webm");
        assert_eq!(config.detection.scheduler_config(), SchedulerConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelens.json");
        fs::write(
            &path,
            r#"{ "detection": { "intervalMs": 250 }, "recording": { "format": "mp4" } }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.detection.interval_ms, 250);
        assert_eq!(config.detection.timeout_ms, Some(2000));
        assert_eq!(config.recording.sink_name(), "capture.mp4");
        assert_eq!(config.recording.fps, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("facelens.json");

        let mut config = AppConfig::default();
        config.recording.slot_name = "session".to_string();
        config.overlay.thickness = 5;
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.detection.interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.recording.slot_name = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelens.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Json(_))));
    }
}
