//! Naming and discovery of pronunciation audio files.
//!
//! Each subject's clip is stored as `wbvocab-{id}.mp3`. The fetcher uses the
//! name to decide whether a clip still needs downloading, and the package
//! builder references it from the note's audio field.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Prefix shared by every audio file this tool writes.
pub const AUDIO_FILE_PREFIX: &str = "wbvocab-";

/// Prefix of in-flight download files, which are never bundled.
const PARTIAL_DOWNLOAD_PREFIX: &str = ".tmp";

/// Default name of the audio directory inside the data directory.
pub const DEFAULT_AUDIO_DIR_NAME: &str = "audio_files";

/// File name of the clip for subject `id`.
///
/// ```
/// use wanikani_deck_core::media::audio_file_name;
///
/// assert_eq!(audio_file_name(2467), "wbvocab-2467.mp3");
/// ```
#[must_use]
pub fn audio_file_name(id: u64) -> String {
    format!("{AUDIO_FILE_PREFIX}{id}.mp3")
}

/// Anki sound tag that plays the clip for subject `id`.
#[must_use]
pub fn sound_reference(id: u64) -> String {
    format!("[sound:{}]", audio_file_name(id))
}

/// Every regular file in `dir`, sorted by name.
///
/// Leftover temporary downloads (`.tmp*`) are skipped; every other file,
/// dotfiles included, is media. A missing directory has no media.
///
/// # Errors
///
/// Returns any IO error other than the directory not existing.
pub fn list_media_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(PARTIAL_DOWNLOAD_PREFIX)
        {
            continue;
        }
        files.push(entry.path());
    }

    files.sort();
    Ok(files)
}
