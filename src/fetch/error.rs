//! Error types for the fetch module.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::cache::CacheError;

/// Errors that abort a fetch pass.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The account has not finished any level and the in-progress level was
    /// not opted into.
    #[error(
        "no levels completed (current level {current_level}) and --include-in-progress-level not passed"
    )]
    NoCompletedLevels {
        /// The level the account is currently working on.
        current_level: u32,
    },

    /// The subscription does not grant any level.
    #[error("subscription grants no levels to export")]
    NoLevelsGranted,

    /// A request to the API or the audio CDN failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Loading or saving the subject cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Preparing the audio directory failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
