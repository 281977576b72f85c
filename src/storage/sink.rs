//! Persistent sink abstraction
//!
//! A sink is an append-only byte region under a well-known name. While a
//! handle is open the content is private to its owner; `finalize` makes it
//! immutable and visible to `read`.

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Sink already open: {0}")]
    AlreadyOpen(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No finalized sink named {0}")]
    NotFound(String),

    #[error("Sink handle is closed: {0}")]
    Closed(String),

    #[error("Invalid sink name: {0:?}")]
    InvalidName(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Options for [`PersistentSink::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Start fresh content. Without it the sink continues an existing
    /// finalized region and fails with `NotFound` if there is none.
    pub create: bool,
}

impl OpenOptions {
    pub fn create() -> Self {
        Self { create: true }
    }

    pub fn existing() -> Self {
        Self { create: false }
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::create()
    }
}

/// Exclusive handle to one open sink
///
/// Not `Clone`: whoever holds it is the only writer.
#[derive(Debug)]
pub struct SinkHandle {
    id: u64,
    name: String,
    bytes_written: u64,
    finalized: bool,
}

impl SinkHandle {
    /// Used by sink implementations when opening
    pub fn new(id: u64, name: impl Into<String>, bytes_written: u64) -> Self {
        Self {
            id,
            name: name.into(),
            bytes_written,
            finalized: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size of the region, including content carried over on reopen
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn record_append(&mut self, len: usize) {
        self.bytes_written += len as u64;
    }

    pub fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// Error for operations on a handle that no longer accepts writes
    pub fn ensure_open(&self) -> SinkResult<()> {
        if self.finalized {
            return Err(SinkError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

/// Append-only named storage
#[async_trait]
pub trait PersistentSink: Send + Sync {
    /// Open a sink for writing
    async fn open(&self, name: &str, options: OpenOptions) -> SinkResult<SinkHandle>;

    /// Append bytes at the end of the sink
    async fn append(&self, handle: &mut SinkHandle, bytes: &[u8]) -> SinkResult<()>;

    /// Flush and close; a second call on the same handle is a no-op
    async fn finalize(&self, handle: &mut SinkHandle) -> SinkResult<()>;

    /// Close without publishing anything appended through this handle
    ///
    /// Whatever was finalized under the name before the open stays readable.
    async fn abort(&self, handle: &mut SinkHandle) -> SinkResult<()>;

    /// Full content of a finalized sink
    async fn read(&self, name: &str) -> SinkResult<Vec<u8>>;
}

/// Reject names that could escape the storage root
pub fn validate_name(name: &str) -> SinkResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.ends_with(super::file::PART_SUFFIX);
    if invalid {
        return Err(SinkError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("capture.webm").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../capture.webm").is_err());
        assert!(validate_name("capture.webm.part").is_err());
    }

    #[test]
    fn test_finalized_handle_rejects_writes() {
        let mut handle = SinkHandle::new(1, "capture.webm", 0);
        assert!(handle.ensure_open().is_ok());
        handle.mark_finalized();
        assert!(matches!(handle.ensure_open(), Err(SinkError::Closed(_))));
    }
}
