//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error while writing results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream or a table file cannot be opened or mapped.
    #[error("cannot read {}: {source}", path.display())]
    StreamUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] lmproc_core::Error),
}

impl Error {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StreamUnavailable {
            path: path.into(),
            source,
        }
    }
}
