//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use wanikani_deck_core::api::{DEFAULT_API_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE};
use wanikani_deck_core::{Config, default_data_dir};

/// Export WaniKani vocabulary into an Anki audio deck.
///
/// Fetches every vocabulary subject of the levels you have completed, downloads
/// the pronunciation audio, and writes an `.apkg` package ready for import.
#[derive(Parser, Debug)]
#[command(name = "wanikani-deck")]
#[command(author, version, about)]
pub struct Args {
    /// WaniKani personal access token (read-only is enough)
    #[arg(long, env = "WANIKANI_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Also export the level you are currently working on
    #[arg(long)]
    pub include_in_progress_level: bool,

    /// Directory for the subject cache, audio and package [default: executable directory]
    #[arg(long, value_name = "DIR")]
    pub data_directory: Option<PathBuf>,

    /// Directory for audio clips [default: <data-directory>/audio_files]
    #[arg(long, value_name = "DIR")]
    pub audio_directory: Option<PathBuf>,

    /// Path of the generated package [default: <data-directory>/wanikani_vocab.apkg]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// WaniKani API root
    #[arg(long, default_value = DEFAULT_API_BASE_URL, value_name = "URL")]
    pub api_base_url: String,

    /// Requests admitted per minute (1-60)
    #[arg(long, default_value_t = DEFAULT_REQUESTS_PER_MINUTE, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub requests_per_minute: u32,

    /// Give up after this many consecutive throttled responses [default: retry forever]
    #[arg(long, value_name = "N")]
    pub max_throttle_retries: Option<u32>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Resolves the arguments into run settings.
    pub fn into_config(self) -> Config {
        let data_dir = self.data_directory.unwrap_or_else(default_data_dir);
        let mut config = Config::new(self.api_token, data_dir)
            .with_api_base_url(self.api_base_url)
            .with_include_in_progress_level(self.include_in_progress_level);
        config.audio_dir = self.audio_directory;
        config.output_path = self.output;
        config.requests_per_minute = self.requests_per_minute;
        config.max_throttle_retries = self.max_throttle_retries;
        config
    }
}
