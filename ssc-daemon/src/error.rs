use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watcher, trigger handling, and the regeneration lane.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("render error: {0}")]
    Render(#[from] ssc_renderer::RenderError),

    #[error("catalog error: {0}")]
    Catalog(#[from] ssc_catalog::CatalogError),

    #[error("sync error: {0}")]
    Sync(#[from] ssc_sync::SyncError),

    #[error(transparent)]
    Trigger(#[from] crate::trigger::TriggerParseError),

    #[error("setting '{setting}' has no staging directory (output.temps is disabled)")]
    StagingDisabled { setting: String },

    #[error("no setting could be watched")]
    NothingToWatch,

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{0}")]
    Task(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
