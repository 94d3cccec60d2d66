//! On-disk cache of previously fetched subjects.
//!
//! The cache is a single JSON object mapping subject id to the subject payload
//! as the API returned it. It only ever grows: a fetch pass merges new pages
//! into the loaded mapping and writes the whole mapping back.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the cache, so an interrupted run leaves the previous cache intact.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::Subject;

/// File name of the cache inside the data directory.
pub const CACHE_FILE_NAME: &str = "last_cached.json";

/// Subjects keyed by id. Ordered so the cache file is stable between runs.
pub type SubjectMap = BTreeMap<u64, Subject>;

/// Errors reading or writing the subject cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading, writing or renaming the cache file failed.
    #[error("IO error on cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file exists but is not a valid subject mapping.
    #[error("cache file {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory mapping could not be serialized.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Handle to the cache file in a data directory.
#[derive(Debug, Clone)]
pub struct SubjectCache {
    path: PathBuf,
}

impl SubjectCache {
    /// Cache stored as [`CACHE_FILE_NAME`] inside `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CACHE_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached mapping. A missing or empty file is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be read and
    /// `CacheError::Parse` if its contents are not a subject mapping.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<SubjectMap, CacheError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no cache file yet");
                return Ok(SubjectMap::new());
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            debug!("cache file is empty");
            return Ok(SubjectMap::new());
        }

        let subjects: SubjectMap =
            serde_json::from_str(&contents).map_err(|source| CacheError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!(subjects = subjects.len(), "loaded cache");
        Ok(subjects)
    }

    /// Replaces the cache file with `subjects`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the temporary file cannot be written or
    /// renamed, and `CacheError::Serialize` if serialization fails.
    #[instrument(skip(self, subjects), fields(path = %self.path.display(), subjects = subjects.len()))]
    pub fn save(&self, subjects: &SubjectMap) -> Result<(), CacheError> {
        let body = to_pretty_json(subjects)?;

        let directory = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_error = |source: std::io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(io_error)?;
        temp.write_all(&body).map_err(io_error)?;
        temp.as_file().sync_all().map_err(io_error)?;
        temp.persist(&self.path).map_err(|e| io_error(e.error))?;

        debug!(bytes = body.len(), "cache written");
        Ok(())
    }
}

/// Four-space indentation, matching caches written by earlier exporter versions.
fn to_pretty_json(subjects: &SubjectMap) -> Result<Vec<u8>, CacheError> {
    let mut body = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    subjects
        .serialize(&mut serializer)
        .map_err(CacheError::Serialize)?;
    Ok(body)
}
