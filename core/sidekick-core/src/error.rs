//! Error types for sidekick-core operations.

use std::path::PathBuf;

/// All errors that can occur in sidekick-core operations.
///
/// Watch, spawn, and kill failures are recoverable: callers log them and the
/// tracker keeps running in a degraded state. Configuration errors are the
/// only ones that abort daemon startup.
#[derive(Debug, thiserror::Error)]
pub enum SidekickError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn {path}: {source}")]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to arm {kind} watch: {details}")]
    WatchFailed { kind: &'static str, details: String },
}

/// Convenience type alias for Results using SidekickError.
pub type Result<T> = std::result::Result<T, SidekickError>;
