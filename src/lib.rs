//! WaniKani Deck Core Library
//!
//! This library exports the vocabulary of a WaniKani account, together with
//! its pronunciation audio, into an Anki `.apkg` package.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Rate-limited, authenticated access to the WaniKani v2 API
//! - [`cache`] - On-disk cache of fetched subjects
//! - [`fetch`] - Level selection, subject pagination and audio download
//! - [`media`] - Audio file naming and discovery
//! - [`package`] - Anki collection and `.apkg` archive writing
//! - [`config`] / [`export`] - Settings and the end-to-end run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cache;
pub mod config;
pub mod export;
pub mod fetch;
pub mod media;
pub mod package;
mod user_agent;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, Clock, ManualClock, RateLimiter, Subject, SystemClock};
pub use cache::{CacheError, SubjectCache, SubjectMap};
pub use config::{Config, ConfigError, default_data_dir};
pub use export::{ExportError, ExportSummary, run, run_with_clock};
pub use fetch::{AudioStats, FetchError, LevelRange, RecordFetcher, export_levels};
pub use package::{Deck, PackageError, PackageSummary, PackageWriter};
