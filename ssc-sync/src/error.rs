//! Error types for ssc-sync.

use std::path::PathBuf;

use thiserror::Error;

use ssc_renderer::RenderError;

/// All errors that can arise from reconciliation and merging.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (fingerprint cache).
    #[error("fingerprint cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The catalog row carries an object type ssc does not write.
    #[error("unsupported object type '{type_code}' for '{name}'")]
    UnsupportedType { name: String, type_code: String },

    /// One or more artifact writes failed during a regeneration.
    #[error("{failed} artifact write(s) failed for '{name}'")]
    WritesFailed { name: String, failed: usize },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
