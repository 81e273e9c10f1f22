//! Error types for ssc-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, rename failed, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file (or referenced settings file) did not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// JSON parse or serialization error, with file path and line context.
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse or serialization error, with file path and line context.
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config declares no settings at all.
    #[error("no settings defined in {path}")]
    NoSettings { path: PathBuf },

    /// `init` found a config file in place and was not forced.
    #[error("config file already exists at {path} (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },

    /// No setting matched the requested name.
    #[error("no setting named '{name}' (available: {available})")]
    SettingNotFound { name: String, available: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io { path: path.into(), source }
}
