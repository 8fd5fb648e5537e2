use std::path::PathBuf;

use thiserror::Error;

/// Library error type for frameshow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured photo library directory is invalid or unreadable.
    #[error("invalid photo directory: {0}")]
    BadDir(PathBuf),

    /// The scan completed but found no photos to show.
    #[error("no photos found in the library")]
    EmptyLibrary,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// SQLite store error.
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}
