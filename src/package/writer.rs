//! Assembling the `.apkg` archive.
//!
//! An `.apkg` file is a zip holding `collection.anki2`, every media file
//! stored under its index (`0`, `1`, …), and a `media` JSON object mapping
//! each index back to the original file name.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::PackageError;
use super::collection::{Timestamp, write_collection};
use super::model::Deck;

/// Name of the collection database inside the archive.
pub const COLLECTION_ENTRY: &str = "collection.anki2";

/// Name of the media index inside the archive.
pub const MEDIA_ENTRY: &str = "media";

/// What a successful write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub notes: usize,
    pub media_files: usize,
}

/// Writes decks and their media into `.apkg` archives.
#[derive(Debug, Clone, Copy)]
pub struct PackageWriter {
    created: Timestamp,
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageWriter {
    /// A writer stamping rows with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            created: Timestamp::now(),
        }
    }

    /// A writer stamping rows with a fixed time, for reproducible output.
    #[must_use]
    pub fn at(created: Timestamp) -> Self {
        Self { created }
    }

    /// Writes `deck` and `media_files` to `output`, replacing any previous file.
    ///
    /// The archive is assembled in a temporary file next to `output` and
    /// renamed into place only when complete.
    ///
    /// # Errors
    ///
    /// Returns `PackageError` if building the collection, reading a media
    /// file or writing the archive fails. No output is left behind on error.
    #[instrument(skip(self, deck, media_files), fields(output = %output.display(), notes = deck.notes().len(), media = media_files.len()))]
    pub async fn write(
        &self,
        deck: &Deck,
        media_files: &[PathBuf],
        output: &Path,
    ) -> Result<PackageSummary, PackageError> {
        info!("generating Anki package");

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(output_dir).map_err(|e| PackageError::io(output_dir, e))?;

        let scratch = tempfile::Builder::new()
            .prefix(".apkg-build")
            .tempdir_in(output_dir)
            .map_err(|e| PackageError::io(output_dir, e))?;
        let collection_path = scratch.path().join(COLLECTION_ENTRY);
        write_collection(&collection_path, deck, self.created).await?;

        let mut archive = tempfile::Builder::new()
            .prefix(".apkg-")
            .tempfile_in(output_dir)
            .map_err(|e| PackageError::io(output_dir, e))?;
        write_archive(archive.as_file_mut(), &collection_path, media_files)?;

        archive
            .persist(output)
            .map_err(|e| PackageError::io(output, e.error))?;

        debug!("package written");
        Ok(PackageSummary {
            path: output.to_path_buf(),
            notes: deck.notes().len(),
            media_files: media_files.len(),
        })
    }
}

fn write_archive(
    file: &mut File,
    collection_path: &Path,
    media_files: &[PathBuf],
) -> Result<(), PackageError> {
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(COLLECTION_ENTRY, options)?;
    copy_into(&mut zip, collection_path)?;

    let mut media_index = BTreeMap::new();
    for (index, path) in media_files.iter().enumerate() {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PackageError::InvalidMediaName { path: path.clone() })?;

        zip.start_file(index.to_string(), options)?;
        copy_into(&mut zip, path)?;
        media_index.insert(index.to_string(), name.to_string());
    }

    zip.start_file(MEDIA_ENTRY, options)?;
    let media_json = serde_json::to_vec(&media_index)?;
    zip.write_all(&media_json)
        .map_err(|e| PackageError::io(MEDIA_ENTRY, e))?;

    zip.finish()?;
    Ok(())
}

fn copy_into<W: Write>(writer: &mut W, path: &Path) -> Result<u64, PackageError> {
    let mut source = File::open(path).map_err(|e| PackageError::io(path, e))?;
    io::copy(&mut source, writer).map_err(|e| PackageError::io(path, e))
}
