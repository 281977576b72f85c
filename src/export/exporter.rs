//! Recording exporter
//!
//! Reads a finalized sink back out for a download collaborator.

use super::types::{ExportResult, ExportedFile, MediaFormat};
use crate::storage::PersistentSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Exporter {
    sink: Arc<dyn PersistentSink>,
    format: MediaFormat,
}

impl Exporter {
    /// `format` is the encoding the recording was made with
    pub fn new(sink: Arc<dyn PersistentSink>, format: MediaFormat) -> Self {
        Self { sink, format }
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Full content of a finalized recording
    ///
    /// Fails with `NotFound` while the recording is still open.
    pub async fn export(&self, name: &str) -> ExportResult<ExportedFile> {
        let bytes = self.sink.read(name).await?;
        let filename = self.filename(name);
        tracing::info!("Exported {} ({} bytes) as {}", name, bytes.len(), filename);
        Ok(ExportedFile {
            bytes,
            mime_type: self.format.mime_type(),
            filename,
        })
    }

    /// Export into a directory, returning the written path
    pub async fn export_to_dir(&self, name: &str, dir: &Path) -> ExportResult<PathBuf> {
        let exported = self.export(name).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&exported.filename);
        tokio::fs::write(&path, &exported.bytes).await?;
        Ok(path)
    }

    fn filename(&self, name: &str) -> String {
        if MediaFormat::from_name(name) == Some(self.format) {
            name.to_string()
        } else {
            format!("{}.{}", name, self.format.extension())
        }
    }
}
