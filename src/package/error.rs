//! Error types for the package module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort writing a package. A failed write leaves no output file.
#[derive(Debug, Error)]
pub enum PackageError {
    /// A note does not have one value per model field.
    #[error("note has {actual} fields but the model defines {expected}")]
    FieldCount {
        /// Fields defined by the note model.
        expected: usize,
        /// Fields supplied by the note.
        actual: usize,
    },

    /// A media file has no usable file name.
    #[error("media file {path} has no valid file name")]
    InvalidMediaName {
        /// The offending media path.
        path: PathBuf,
    },

    /// Reading media or writing the archive failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the collection database failed.
    #[error("failed to write collection database: {0}")]
    Database(#[from] sqlx::Error),

    /// Assembling the zip archive failed.
    #[error("failed to write package archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serializing collection metadata failed.
    #[error("failed to serialize collection metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PackageError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
