//! Resolved settings of an export run.
//!
//! [`Config`] is built from the command line (or by hand in tests) and
//! resolves every path the run touches from a single data directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::{DEFAULT_API_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE};
use crate::cache::SubjectCache;
use crate::media::DEFAULT_AUDIO_DIR_NAME;

/// Default file name of the generated package inside the data directory.
pub const DEFAULT_PACKAGE_FILE_NAME: &str = "wanikani_vocab.apkg";

/// Highest request rate the API allows.
pub const MAX_REQUESTS_PER_MINUTE: u32 = 60;

/// Invalid settings, reported before any request is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API token must not be empty")]
    EmptyToken,

    #[error("requests per minute must be between 1 and {MAX_REQUESTS_PER_MINUTE}, got {0}")]
    RequestsPerMinute(u32),

    #[error("API base URL must not be empty")]
    EmptyBaseUrl,
}

/// Settings of one export run.
#[derive(Clone)]
pub struct Config {
    pub api_token: String,
    /// Also export the level the account is currently working on.
    pub include_in_progress_level: bool,
    /// Holds the cache and, unless overridden, the audio and the package.
    pub data_dir: PathBuf,
    pub audio_dir: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub api_base_url: String,
    pub requests_per_minute: u32,
    /// Give up after this many consecutive throttled responses. `None` retries
    /// indefinitely.
    pub max_throttle_retries: Option<u32>,
}

// Hand-written so the token never reaches logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<redacted>")
            .field("include_in_progress_level", &self.include_in_progress_level)
            .field("data_dir", &self.data_dir)
            .field("audio_dir", &self.audio_dir)
            .field("output_path", &self.output_path)
            .field("api_base_url", &self.api_base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_throttle_retries", &self.max_throttle_retries)
            .finish()
    }
}

impl Config {
    /// Settings with every default applied, storing data in `data_dir`.
    #[must_use]
    pub fn new(api_token: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_token: api_token.into(),
            include_in_progress_level: false,
            data_dir: data_dir.into(),
            audio_dir: None,
            output_path: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_throttle_retries: None,
        }
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_include_in_progress_level(mut self, include: bool) -> Self {
        self.include_in_progress_level = include;
        self
    }

    #[must_use]
    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Checks the settings before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty token or base URL, or a request
    /// rate outside `1..=60`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(1..=MAX_REQUESTS_PER_MINUTE).contains(&self.requests_per_minute) {
            return Err(ConfigError::RequestsPerMinute(self.requests_per_minute));
        }
        Ok(())
    }

    /// Directory holding the pronunciation clips.
    #[must_use]
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_AUDIO_DIR_NAME))
    }

    /// Where the package is written.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_PACKAGE_FILE_NAME))
    }

    #[must_use]
    pub fn cache(&self) -> SubjectCache {
        SubjectCache::in_dir(&self.data_dir)
    }
}

/// Directory of the running executable, falling back to the working directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
