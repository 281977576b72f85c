//! Recording export
//!
//! Hands finalized recordings to a download collaborator.

pub mod exporter;
pub mod types;

pub use exporter::Exporter;
pub use types::{ExportError, ExportResult, ExportedFile, MediaFormat};
