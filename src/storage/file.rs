//! File-backed sink
//!
//! While open, content lives in `<name>.part` next to its final location.
//! `finalize` renames it to `<name>`, which is what readers see; a previous
//! `<name>` stays readable until then. Creating the
//! `.part` file with create-new semantics makes a second writer, in this or
//! another process, fail with `AlreadyOpen`.

use super::sink::{validate_name, OpenOptions, PersistentSink, SinkError, SinkHandle, SinkResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Suffix of in-progress files
pub const PART_SUFFIX: &str = ".part";

struct OpenFile {
    file: fs::File,
    part_path: PathBuf,
    final_path: PathBuf,
}

/// Registry entry; the path stays readable while an append holds the file
struct OpenEntry {
    part_path: PathBuf,
    file: Arc<tokio::sync::Mutex<OpenFile>>,
}

pub struct FileSink {
    root: PathBuf,
    sync_on_append: bool,
    files: Mutex<HashMap<u64, OpenEntry>>,
    next_id: AtomicU64,
}

impl FileSink {
    /// Sink rooted at a directory, created on first open
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_on_append: true,
            files: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether every append is synced to disk before it returns
    pub fn with_sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a finalized sink is readable at
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn part_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{PART_SUFFIX}"))
    }

    fn is_open_here(&self, part_path: &Path) -> bool {
        self.files
            .lock()
            .values()
            .any(|entry| entry.part_path == part_path)
    }

    fn take_entry(&self, handle: &SinkHandle) -> SinkResult<Arc<tokio::sync::Mutex<OpenFile>>> {
        self.files
            .lock()
            .remove(&handle.id())
            .map(|entry| entry.file)
            .ok_or_else(|| SinkError::Closed(handle.name().to_string()))
    }

    async fn ensure_root(&self) -> SinkResult<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SinkError::StorageUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => fs::create_dir_all(&self.root)
                .await
                .map_err(|e| SinkError::StorageUnavailable(format!("{}: {}", self.root.display(), e))),
            Err(e) => Err(SinkError::StorageUnavailable(format!("{}: {}", self.root.display(), e))),
        }
    }

    /// Promote a `.part` file left behind by a crashed writer
    ///
    /// Returns `true` if something was recovered. Files still open in this
    /// sink are left alone.
    pub async fn recover(&self, name: &str) -> SinkResult<bool> {
        validate_name(name)?;
        let part_path = self.part_path(name);

        if self.is_open_here(&part_path) {
            return Err(SinkError::AlreadyOpen(name.to_string()));
        }

        match fs::rename(&part_path, self.final_path(name)).await {
            Ok(()) => {
                tracing::warn!("Recovered unfinalized sink {:?}", part_path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn map_open_error(name: &str, e: std::io::Error) -> SinkError {
    match e.kind() {
        ErrorKind::AlreadyExists => SinkError::AlreadyOpen(name.to_string()),
        ErrorKind::PermissionDenied => SinkError::StorageUnavailable(format!("{name}: {e}")),
        _ => SinkError::Io(e),
    }
}

async fn write_through(file: &mut fs::File, bytes: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}

#[async_trait]
impl PersistentSink for FileSink {
    async fn open(&self, name: &str, options: OpenOptions) -> SinkResult<SinkHandle> {
        validate_name(name)?;
        self.ensure_root().await?;

        let part_path = self.part_path(name);
        let final_path = self.final_path(name);

        if !options.create && fs::metadata(&final_path).await.is_err() {
            return Err(SinkError::NotFound(name.to_string()));
        }

        // Claims the name; fails if any writer already holds it
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
            .await
            .map_err(|e| map_open_error(name, e))?;

        let mut existing = 0;
        if !options.create {
            // Continue on a copy; `<name>` stays readable until finalize
            drop(file);
            if let Err(e) = fs::copy(&final_path, &part_path).await {
                let _ = fs::remove_file(&part_path).await;
                return Err(match e.kind() {
                    ErrorKind::NotFound => SinkError::NotFound(name.to_string()),
                    _ => SinkError::Io(e),
                });
            }
            file = fs::OpenOptions::new().append(true).open(&part_path).await?;
            existing = file.metadata().await?.len();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.files.lock().insert(
            id,
            OpenEntry {
                part_path: part_path.clone(),
                file: Arc::new(tokio::sync::Mutex::new(OpenFile {
                    file,
                    part_path,
                    final_path,
                })),
            },
        );

        tracing::info!("Opened sink {} (handle {}, {} existing bytes)", name, id, existing);
        Ok(SinkHandle::new(id, name, existing))
    }

    async fn append(&self, handle: &mut SinkHandle, bytes: &[u8]) -> SinkResult<()> {
        handle.ensure_open()?;
        let entry = self
            .files
            .lock()
            .get(&handle.id())
            .map(|entry| entry.file.clone())
            .ok_or_else(|| SinkError::Closed(handle.name().to_string()))?;

        let mut open = entry.lock().await;
        if let Err(e) = write_through(&mut open.file, bytes, self.sync_on_append).await {
            // Drop whatever part of this chunk reached the file
            if let Err(trunc) = open.file.set_len(handle.bytes_written()).await {
                tracing::error!("Failed to trim torn append on {}: {}", handle.name(), trunc);
            }
            return Err(e.into());
        }

        handle.record_append(bytes.len());
        Ok(())
    }

    async fn finalize(&self, handle: &mut SinkHandle) -> SinkResult<()> {
        if handle.is_finalized() {
            return Ok(());
        }

        let entry = self.take_entry(handle)?;
        let mut open = entry.lock().await;

        // Publish whatever reached the file even if the final flush fails,
        // but never more than the appends that succeeded
        let flushed = match open.file.flush().await {
            Ok(()) => match open.file.set_len(handle.bytes_written()).await {
                Ok(()) => open.file.sync_all().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = &flushed {
            tracing::error!("Flush failed while finalizing {}: {}", handle.name(), e);
        }

        fs::rename(&open.part_path, &open.final_path).await?;
        handle.mark_finalized();

        tracing::info!(
            "Finalized sink {} ({} bytes) at {:?}",
            handle.name(),
            handle.bytes_written(),
            open.final_path
        );
        flushed.map_err(SinkError::from)
    }

    async fn abort(&self, handle: &mut SinkHandle) -> SinkResult<()> {
        if handle.is_finalized() {
            return Ok(());
        }

        let entry = self.take_entry(handle)?;
        let open = entry.lock().await;
        handle.mark_finalized();

        fs::remove_file(&open.part_path).await?;
        tracing::info!("Aborted sink {}", handle.name());
        Ok(())
    }

    async fn read(&self, name: &str) -> SinkResult<Vec<u8>> {
        validate_name(name)?;
        match fs::read(self.final_path(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SinkError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_finalize_read() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut handle, b"chunk-a").await.unwrap();
        sink.append(&mut handle, b"chunk-b").await.unwrap();

        // Not visible until finalized
        assert!(matches!(sink.read("capture.webm").await, Err(SinkError::NotFound(_))));

        sink.finalize(&mut handle).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"chunk-achunk-b");
        assert_eq!(handle.bytes_written(), 14);
        assert!(!dir.path().join("capture.webm.part").exists());
    }

    #[tokio::test]
    async fn test_finalize_twice_is_noop() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut handle, b"abc").await.unwrap();
        sink.finalize(&mut handle).await.unwrap();
        sink.finalize(&mut handle).await.unwrap();

        assert!(matches!(
            sink.append(&mut handle, b"late").await,
            Err(SinkError::Closed(_))
        ));
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_second_open_is_rejected() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let _first = sink.open("capture.webm", OpenOptions::create()).await.unwrap();

        assert!(matches!(
            sink.open("capture.webm", OpenOptions::create()).await,
            Err(SinkError::AlreadyOpen(_))
        ));

        // A second sink over the same directory stands in for another process
        let other = FileSink::new(dir.path());
        assert!(matches!(
            other.open("capture.webm", OpenOptions::create()).await,
            Err(SinkError::AlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_create_replaces_previous_recording_on_finalize() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut first = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut first, b"old").await.unwrap();
        sink.finalize(&mut first).await.unwrap();

        let mut second = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut second, b"new").await.unwrap();
        // Previous recording stays readable meanwhile
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"old");

        sink.finalize(&mut second).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_open_existing_continues_content() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        assert!(matches!(
            sink.open("capture.webm", OpenOptions::existing()).await,
            Err(SinkError::NotFound(_))
        ));

        let mut handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut handle, b"one").await.unwrap();
        sink.finalize(&mut handle).await.unwrap();

        let mut handle = sink.open("capture.webm", OpenOptions::existing()).await.unwrap();
        assert_eq!(handle.bytes_written(), 3);
        sink.append(&mut handle, b"two").await.unwrap();
        sink.finalize(&mut handle).await.unwrap();

        assert_eq!(sink.read("capture.webm").await.unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn test_finalize_publishes_only_successful_appends() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut handle, b"chunk-a").await.unwrap();
        sink.append(&mut handle, b"chunk-b").await.unwrap();

        // Bytes of a write that never completed, e.g. cut short by a full disk
        let mut part = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("capture.webm.part"))
            .unwrap();
        std::io::Write::write_all(&mut part, b"torn-c").unwrap();
        drop(part);

        sink.finalize(&mut handle).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"chunk-achunk-b");
    }

    #[tokio::test]
    async fn test_previous_content_readable_while_continuing() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut handle, b"one").await.unwrap();
        sink.finalize(&mut handle).await.unwrap();

        let mut handle = sink.open("capture.webm", OpenOptions::existing()).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"one");
        sink.append(&mut handle, b"two").await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"one");

        sink.finalize(&mut handle).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn test_abort_keeps_previous_recording() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut first = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut first, b"kept").await.unwrap();
        sink.finalize(&mut first).await.unwrap();

        let mut fresh = sink.open("capture.webm", OpenOptions::create()).await.unwrap();
        sink.append(&mut fresh, b"dropped").await.unwrap();
        sink.abort(&mut fresh).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"kept");

        let mut resumed = sink.open("capture.webm", OpenOptions::existing()).await.unwrap();
        sink.append(&mut resumed, b"-dropped").await.unwrap();
        sink.abort(&mut resumed).await.unwrap();
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"kept");
        assert!(!dir.path().join("capture.webm.part").exists());
    }

    #[tokio::test]
    async fn test_root_that_is_a_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("storage");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let sink = FileSink::new(&blocker);
        assert!(matches!(
            sink.open("capture.webm", OpenOptions::create()).await,
            Err(SinkError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_leftover_part_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("capture.webm.part"), b"partial").unwrap();

        let sink = FileSink::new(dir.path());
        assert!(matches!(
            sink.open("capture.webm", OpenOptions::create()).await,
            Err(SinkError::AlreadyOpen(_))
        ));

        assert!(sink.recover("capture.webm").await.unwrap());
        assert_eq!(sink.read("capture.webm").await.unwrap(), b"partial");
        assert!(!sink.recover("capture.webm").await.unwrap());
    }

    #[tokio::test]
    async fn test_recover_refuses_live_handle() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let _handle = sink.open("capture.webm", OpenOptions::create()).await.unwrap();

        assert!(matches!(
            sink.recover("capture.webm").await,
            Err(SinkError::AlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_ignores_busy_unrelated_handle() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let handle = sink.open("a.webm", OpenOptions::create()).await.unwrap();
        std::fs::write(dir.path().join("b.webm.part"), b"leftover").unwrap();

        // Stands in for an append running on the other handle
        let busy = sink.files.lock().get(&handle.id()).unwrap().file.clone();
        let _guard = busy.lock().await;

        assert!(sink.recover("b.webm").await.unwrap());
        assert_eq!(sink.read("b.webm").await.unwrap(), b"leftover");
    }
}
