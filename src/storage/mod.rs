//! Persistent storage for recordings

pub mod file;
pub mod memory;
pub mod sink;

pub use file::FileSink;
pub use memory::MemorySink;
pub use sink::{OpenOptions, PersistentSink, SinkError, SinkHandle, SinkResult};
