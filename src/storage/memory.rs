//! In-process sink
//!
//! Same visibility rules as the file sink, without touching disk.

use super::sink::{validate_name, OpenOptions, PersistentSink, SinkError, SinkHandle, SinkResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct MemoryState {
    finalized: HashMap<String, Vec<u8>>,
    /// Open regions by handle id
    open: HashMap<u64, OpenRegion>,
    next_id: u64,
}

struct OpenRegion {
    name: String,
    data: Vec<u8>,
}

pub struct MemorySink {
    available: bool,
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            available: true,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A sink whose storage capability is missing; every open fails
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Names of all finalized regions
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().finalized.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentSink for MemorySink {
    async fn open(&self, name: &str, options: OpenOptions) -> SinkResult<SinkHandle> {
        validate_name(name)?;
        if !self.available {
            return Err(SinkError::StorageUnavailable("in-memory storage disabled".to_string()));
        }

        let mut state = self.state.lock();
        if state.open.values().any(|region| region.name == name) {
            return Err(SinkError::AlreadyOpen(name.to_string()));
        }

        // Continuing a region works on a copy so abort leaves the original
        let data = if options.create {
            Vec::new()
        } else {
            state
                .finalized
                .get(name)
                .cloned()
                .ok_or_else(|| SinkError::NotFound(name.to_string()))?
        };

        state.next_id += 1;
        let id = state.next_id;
        let existing = data.len() as u64;
        state.open.insert(
            id,
            OpenRegion {
                name: name.to_string(),
                data,
            },
        );

        Ok(SinkHandle::new(id, name, existing))
    }

    async fn append(&self, handle: &mut SinkHandle, bytes: &[u8]) -> SinkResult<()> {
        handle.ensure_open()?;
        let mut state = self.state.lock();
        let region = state
            .open
            .get_mut(&handle.id())
            .ok_or_else(|| SinkError::Closed(handle.name().to_string()))?;
        region.data.extend_from_slice(bytes);
        handle.record_append(bytes.len());
        Ok(())
    }

    async fn finalize(&self, handle: &mut SinkHandle) -> SinkResult<()> {
        if handle.is_finalized() {
            return Ok(());
        }
        let mut state = self.state.lock();
        let region = state
            .open
            .remove(&handle.id())
            .ok_or_else(|| SinkError::Closed(handle.name().to_string()))?;
        state.finalized.insert(region.name, region.data);
        handle.mark_finalized();
        Ok(())
    }

    async fn abort(&self, handle: &mut SinkHandle) -> SinkResult<()> {
        if handle.is_finalized() {
            return Ok(());
        }
        self.state
            .lock()
            .open
            .remove(&handle.id())
            .ok_or_else(|| SinkError::Closed(handle.name().to_string()))?;
        handle.mark_finalized();
        Ok(())
    }

    async fn read(&self, name: &str) -> SinkResult<Vec<u8>> {
        self.state
            .lock()
            .finalized
            .get(name)
            .cloned()
            .ok_or_else(|| SinkError::NotFound(name.to_string()))
    }
}
