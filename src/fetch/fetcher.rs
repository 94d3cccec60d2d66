//! Cursor-paginated subject fetching and audio download.

use std::path::Path;

use indicatif::ProgressBar;
use tracing::{debug, info, instrument};

use super::{FetchError, LevelRange};
use crate::api::constants::{SUBJECTS_PATH, USER_PATH};
use crate::api::{ApiClient, SubjectPage, User, UserResource};
use crate::cache::{SubjectCache, SubjectMap};
use crate::media::audio_file_name;

/// Subject types requested from the catalogue.
pub const SUBJECT_TYPES: &str = "kana_vocabulary,vocabulary";

/// Result of walking the subject catalogue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    /// Pages that contained at least one subject.
    pub pages: usize,
    /// Subjects received across all pages (before de-duplication).
    pub subjects: usize,
}

/// Result of the audio pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AudioStats {
    /// Clips downloaded in this run.
    pub downloaded: usize,
    /// Subjects whose clip was already on disk.
    pub already_present: usize,
    /// Subjects without an MP3 pronunciation.
    pub unavailable: usize,
}

/// Pulls the vocabulary catalogue and its audio through an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct RecordFetcher {
    client: ApiClient,
}

impl RecordFetcher {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the account's level and subscription.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Api` if the request or decoding fails.
    #[instrument(skip(self))]
    pub async fn fetch_user(&self) -> Result<User, FetchError> {
        let url = self.client.endpoint(USER_PATH)?;
        let resource: UserResource = self.client.get_json(&url, &[]).await?;
        debug!(level = resource.data.level, "fetched user");
        Ok(resource.data)
    }

    /// Walks every page of vocabulary in `levels`, merging into `subjects`.
    ///
    /// Each page after the first resumes after the last id of the previous
    /// page; the walk stops at the first empty page. A subject seen again
    /// replaces the earlier copy.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Api` if any page request fails.
    #[instrument(skip(self, subjects), fields(max_level = levels.max()))]
    pub async fn fetch_subjects(
        &self,
        levels: LevelRange,
        subjects: &mut SubjectMap,
    ) -> Result<PageStats, FetchError> {
        let url = self.client.endpoint(SUBJECTS_PATH)?;
        let mut stats = PageStats::default();
        let mut after_id: Option<u64> = None;

        loop {
            let query = subjects_query(levels, after_id);
            let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
            let page: SubjectPage = self.client.get_json(&url, &pairs).await?;

            let Some(last) = page.data.last() else {
                break;
            };
            after_id = Some(last.id);

            stats.pages += 1;
            stats.subjects += page.data.len();
            debug!(
                page = stats.pages,
                received = page.data.len(),
                after_id = ?after_id,
                "merged subject page"
            );

            for subject in page.data {
                subjects.insert(subject.id, subject);
            }
        }

        Ok(stats)
    }

    /// Loads the cache, merges the current catalogue into it and saves it back.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Cache` if the cache cannot be read or written and
    /// `FetchError::Api` if a page request fails. The cache is not written
    /// when fetching fails.
    #[instrument(skip(self, cache), fields(cache = %cache.path().display()))]
    pub async fn fetch_records(
        &self,
        levels: LevelRange,
        cache: &SubjectCache,
    ) -> Result<SubjectMap, FetchError> {
        let mut subjects = cache.load()?;
        let cached = subjects.len();

        info!(levels = %levels.to_query_value(), "fetching subjects");
        let stats = self.fetch_subjects(levels, &mut subjects).await?;

        cache.save(&subjects)?;
        info!(
            cached,
            pages = stats.pages,
            received = stats.subjects,
            total = subjects.len(),
            "subjects cached"
        );
        Ok(subjects)
    }

    /// Downloads the MP3 clip of every subject whose file is not on disk yet.
    ///
    /// The first `audio/mpeg` pronunciation of a subject is used; subjects
    /// without one are skipped. Existing files are never re-downloaded.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Io` if the audio directory cannot be created or
    /// probed, and `FetchError::Api` if a download fails.
    #[instrument(skip(self, subjects, progress), fields(dir = %audio_dir.display(), subjects = subjects.len()))]
    pub async fn download_missing_audio(
        &self,
        subjects: &SubjectMap,
        audio_dir: &Path,
        progress: &ProgressBar,
    ) -> Result<AudioStats, FetchError> {
        tokio::fs::create_dir_all(audio_dir)
            .await
            .map_err(|e| FetchError::io(audio_dir, e))?;

        info!("fetching subject audio; this may take a while");
        progress.set_length(subjects.len() as u64);

        let mut stats = AudioStats::default();
        for (id, subject) in subjects {
            let path = audio_dir.join(audio_file_name(*id));
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| FetchError::io(&path, e))?;

            if exists {
                stats.already_present += 1;
            } else if let Some(audio) = subject.mp3_audio() {
                info!(subject = id, "fetching audio");
                self.client.download_to_file(&audio.url, &path).await?;
                stats.downloaded += 1;
            } else {
                debug!(subject = id, "no mp3 pronunciation available");
                stats.unavailable += 1;
            }

            progress.inc(1);
        }

        progress.finish_and_clear();
        info!(
            downloaded = stats.downloaded,
            already_present = stats.already_present,
            unavailable = stats.unavailable,
            "audio up to date"
        );
        Ok(stats)
    }
}

/// Query of one catalogue page; `after_id` resumes after the previous page.
fn subjects_query(levels: LevelRange, after_id: Option<u64>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("levels", levels.to_query_value()),
        ("types", SUBJECT_TYPES.to_string()),
        ("hidden", "false".to_string()),
    ];
    if let Some(id) = after_id {
        query.push(("page_after_id", id.to_string()));
    }
    query
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn range(max: u32) -> LevelRange {
        LevelRange::up_to(max).unwrap()
    }

    #[test]
    fn test_first_page_query_has_no_cursor() {
        let query = subjects_query(range(2), None);

        assert!(query.contains(&("levels", "1,2".to_string())));
        assert!(query.contains(&("types", SUBJECT_TYPES.to_string())));
        assert!(query.contains(&("hidden", "false".to_string())));
        assert!(!query.iter().any(|(key, _)| *key == "page_after_id"));
    }

    #[test]
    fn test_next_page_query_resumes_after_id() {
        let query = subjects_query(range(1), Some(2467));

        assert!(query.contains(&("page_after_id", "2467".to_string())));
    }
}
