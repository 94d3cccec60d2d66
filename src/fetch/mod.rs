//! Fetching vocabulary subjects and their pronunciation audio.
//!
//! A fetch pass decides which levels to export from the account's progress,
//! walks the subject catalogue page by page, merges every page into the cached
//! mapping, writes the cache back, and finally downloads any audio clip not
//! yet on disk.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use indicatif::ProgressBar;
//! use wanikani_deck_core::api::{ApiClient, RateLimiter};
//! use wanikani_deck_core::cache::SubjectCache;
//! use wanikani_deck_core::fetch::{RecordFetcher, export_levels};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new("https://api.wanikani.com/v2/", "token", Arc::new(RateLimiter::new(60)))?;
//! let fetcher = RecordFetcher::new(client);
//!
//! let user = fetcher.fetch_user().await?;
//! let levels = export_levels(&user, false)?;
//! let subjects = fetcher.fetch_records(levels, &SubjectCache::in_dir(Path::new("."))).await?;
//! fetcher
//!     .download_missing_audio(&subjects, Path::new("audio_files"), &ProgressBar::hidden())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod fetcher;
mod levels;

pub use error::FetchError;
pub use fetcher::{AudioStats, PageStats, RecordFetcher, SUBJECT_TYPES};
pub use levels::{LevelRange, export_levels};
