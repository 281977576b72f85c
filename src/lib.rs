//! FaceLens - live camera preview with face overlays and local recording.
//!
//! The library wires a capture → detect → composite → record pipeline:
//! a fixed-cadence detection scheduler, a double-buffered compositor, a
//! recording state machine writing chunks to an append-only sink, and an
//! exporter that reads finished recordings back out.

pub mod capture;
pub mod config;
pub mod detect;
pub mod export;
pub mod pipeline;
pub mod recorder;
pub mod render;
pub mod storage;
pub mod utils;

pub use config::AppConfig;
pub use pipeline::Pipeline;
pub use utils::{AppError, AppResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facelens=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
