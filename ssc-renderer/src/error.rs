//! Error types for ssc-renderer.

use thiserror::Error;

/// All errors that can arise from DDL rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// The catalog row carries an object type the generator does not emit.
    #[error("cannot render '{name}': unsupported object type '{type_code}'")]
    UnsupportedType { name: String, type_code: String },
}
