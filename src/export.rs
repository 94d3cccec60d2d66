//! The end-to-end export run.
//!
//! One run validates the settings, asks the API which levels the account may
//! export, refreshes the subject cache, downloads missing audio and finally
//! writes the package. Every request shares one [`RateLimiter`].

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::{ApiClient, ApiError, Clock, RateLimiter, SystemClock};
use crate::config::{Config, ConfigError};
use crate::fetch::{AudioStats, FetchError, RecordFetcher, export_levels};
use crate::media::list_media_files;
use crate::package::{Deck, PackageError, PackageWriter};

/// Errors that abort an export run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to list media in {path}: {source}")]
    Media {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Highest level exported.
    pub max_level: u32,
    /// Notes in the package, one per cached subject.
    pub notes: usize,
    /// Media files bundled into the package.
    pub media_files: usize,
    pub audio: AudioStats,
    pub output: PathBuf,
}

/// Runs an export against the real wall clock.
///
/// # Errors
///
/// Returns `ExportError` for invalid settings, when the account has nothing
/// to export, or when any request, cache, media or package step fails.
pub async fn run(config: &Config, progress: &ProgressBar) -> Result<ExportSummary, ExportError> {
    run_with_clock(config, Arc::new(SystemClock), progress).await
}

/// Runs an export whose rate limiting and backoff use `clock`.
///
/// # Errors
///
/// See [`run`].
#[instrument(skip_all, fields(data_dir = %config.data_dir.display()))]
pub async fn run_with_clock(
    config: &Config,
    clock: Arc<dyn Clock>,
    progress: &ProgressBar,
) -> Result<ExportSummary, ExportError> {
    config.validate()?;

    let limiter = Arc::new(RateLimiter::with_clock(config.requests_per_minute, clock));
    let client = ApiClient::new(&config.api_base_url, &config.api_token, limiter)?
        .with_max_throttle_retries(config.max_throttle_retries);
    let fetcher = RecordFetcher::new(client);

    let user = fetcher.fetch_user().await?;
    let levels = export_levels(&user, config.include_in_progress_level)?;
    info!(
        current_level = user.level,
        max_level = levels.max(),
        "exporting vocabulary"
    );

    let subjects = fetcher.fetch_records(levels, &config.cache()).await?;

    let audio_dir = config.audio_dir();
    let audio = fetcher
        .download_missing_audio(&subjects, &audio_dir, progress)
        .await?;

    let deck = Deck::from_subjects(subjects.values());
    let media = list_media_files(&audio_dir).map_err(|source| ExportError::Media {
        path: audio_dir.clone(),
        source,
    })?;

    let summary = PackageWriter::new()
        .write(&deck, &media, &config.output_path())
        .await?;

    Ok(ExportSummary {
        max_level: levels.max(),
        notes: summary.notes,
        media_files: summary.media_files,
        audio,
        output: summary.path,
    })
}
