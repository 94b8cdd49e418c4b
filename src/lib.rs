//! camlock: view-matrix acquisition and world-to-screen projection
//!
//! This library finds a camera's view matrix inside a separately running
//! process, keeps it validated and refreshed every tick, and projects
//! world-space points to screen space for an overlay.
//!
//! # Architecture
//!
//! - **Platform Layer**: Abstracts single and batched (scatter) memory reads
//! - **Camera Layer**: Locates camera objects and resolves their matrix addresses
//! - **Matrix Layer**: Raw matrix layout, decomposed snapshot and validation
//! - **Acquisition**: Retry state machine that converges on a valid matrix
//! - **Updater**: Per-tick batched refresh of the committed snapshot
//! - **Projector**: Pure world-to-screen math over the committed snapshot
//! - **Context**: Explicit owner of all of the above and the public surface

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod camera;
pub mod config;
pub mod context;
pub mod matrix;
pub mod platform;
pub mod projector;
pub mod session;
pub mod updater;
pub mod utils;

// Re-export commonly used types
pub use acquisition::{AcquireError, AcquisitionState};
pub use config::CameraConfig;
pub use context::{CameraContext, DebugSnapshot};
pub use platform::{MemoryReader, ScatterReader};
pub use projector::{ProjectOptions, Viewport};
pub use session::{LocalViewer, SessionEvent, SessionProbe};

/// Result type used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for camlock
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote memory error
    #[error("Memory error: {0}")]
    Memory(#[from] platform::MemoryError),

    /// Camera acquisition did not complete
    #[error("Acquisition failed: {0}")]
    Acquire(#[from] acquisition::AcquireError),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for the library
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("camlock=info"))
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}
