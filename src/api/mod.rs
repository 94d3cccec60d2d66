//! Rate-limited access to the WaniKani v2 API.
//!
//! This module provides the request gate every outbound call goes through:
//! an authenticated [`ApiClient`] that admits at most a fixed number of
//! requests per wall-clock minute via [`RateLimiter`] and transparently
//! retries throttled (`429`) responses after the server-specified delay.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wanikani_deck_core::api::{ApiClient, RateLimiter, UserResource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(
//!     "https://api.wanikani.com/v2/",
//!     "my-token",
//!     Arc::new(RateLimiter::new(60)),
//! )?;
//! let user: UserResource = client.get_json(&client.endpoint("user")?, &[]).await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod rate_limiter;
mod types;

pub use client::ApiClient;
pub use constants::{DEFAULT_API_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE};
pub use error::ApiError;
pub use rate_limiter::{
    Admission, Clock, ManualClock, RateLimiter, SystemClock, parse_rate_limit_reset,
    parse_retry_after,
};
pub use types::{
    AUDIO_CONTENT_TYPE, Meaning, PronunciationAudio, Reading, Subject, SubjectData, SubjectPage,
    Subscription, User, UserResource,
};
