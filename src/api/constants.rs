//! Constants for the API module (endpoints, timeouts, rate limiting).

use std::time::Duration;

/// Default WaniKani v2 API root. Endpoint paths are joined onto this.
pub const DEFAULT_API_BASE_URL: &str = "https://api.wanikani.com/v2/";

/// Path of the account endpoint, relative to the API root.
pub const USER_PATH: &str = "user";

/// Path of the subject catalogue endpoint, relative to the API root.
pub const SUBJECTS_PATH: &str = "subjects";

/// Requests admitted per wall-clock minute by default.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (2 minutes).
pub const READ_TIMEOUT_SECS: u64 = 120;

/// Header carrying the Unix timestamp at which the server-side window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "ratelimit-reset";

/// Header pinning the API revision the response shapes were written against.
pub const API_REVISION_HEADER: &str = "wanikani-revision";

/// API revision sent with every API request.
pub const API_REVISION: &str = "20170710";

/// Maximum throttle backoff (1 hour) to prevent excessive delays.
pub const MAX_THROTTLE_BACKOFF: Duration = Duration::from_secs(3600);

/// Length of one rate limiting bucket.
pub const BUCKET_LENGTH: Duration = Duration::from_secs(60);
