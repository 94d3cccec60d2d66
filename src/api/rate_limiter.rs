//! Per-minute request quota for API calls.
//!
//! This module provides the [`RateLimiter`] struct which admits at most a fixed
//! number of requests per wall-clock minute. A minute bucket is identified by
//! truncating the current Unix time to the minute; once a bucket's quota is
//! used up, callers wait until the next bucket begins.
//!
//! Time is read (and slept) through the [`Clock`] trait so the limiter and the
//! throttle backoff in the client can be driven deterministically.
//!
//! # Example
//!
//! ```
//! use wanikani_deck_core::api::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(60);
//!
//! // The first 60 calls in a minute proceed immediately; the 61st waits
//! // for the next minute bucket.
//! limiter.acquire().await;
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::constants::{BUCKET_LENGTH, MAX_THROTTLE_BACKOFF};

/// Source of wall-clock time and sleeping for the request gate.
///
/// Object-safe via `async_trait` so the limiter can hold an `Arc<dyn Clock>`.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the system time and the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock whose time only moves when something sleeps on it.
///
/// Every sleep is recorded, which makes it suitable for asserting on the exact
/// waits the gate performs without spending real time.
#[derive(Debug)]
pub struct ManualClock {
    state: std::sync::Mutex<ManualClockState>,
}

#[derive(Debug)]
struct ManualClockState {
    now: SystemTime,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn starting_at(start: SystemTime) -> Self {
        Self {
            state: std::sync::Mutex::new(ManualClockState {
                now: start,
                sleeps: Vec::new(),
            }),
        }
    }

    /// Moves the clock forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
    }

    /// Returns every sleep performed so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Outcome of asking the limiter for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed now; the slot has been consumed.
    Admitted,
    /// The current bucket is full; retry after this long.
    Wait(Duration),
}

/// Usage of the current minute bucket.
#[derive(Debug, Default)]
struct MinuteBucket {
    /// Unix time truncated to the minute.
    minute: u64,
    /// Requests admitted in this minute.
    used: u32,
}

/// Per-minute request quota shared by every call the client makes.
///
/// Only the current bucket is tracked; a request in a new minute replaces the
/// previous bucket.
pub struct RateLimiter {
    quota: u32,
    clock: Arc<dyn Clock>,
    bucket: Mutex<MinuteBucket>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("quota", &self.quota)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter admitting `quota` requests per minute on the system clock.
    ///
    /// A quota of zero is raised to one so the gate can never block forever.
    #[must_use]
    pub fn new(quota: u32) -> Self {
        Self::with_clock(quota, Arc::new(SystemClock))
    }

    /// Creates a limiter on a caller-supplied clock.
    #[must_use]
    #[instrument(skip(clock))]
    pub fn with_clock(quota: u32, clock: Arc<dyn Clock>) -> Self {
        debug!("creating rate limiter");
        Self {
            quota: quota.max(1),
            clock,
            bucket: Mutex::new(MinuteBucket::default()),
        }
    }

    /// Requests admitted per minute.
    #[must_use]
    pub fn quota(&self) -> u32 {
        self.quota
    }

    /// The clock this limiter reads and sleeps on.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Takes a slot in the current minute bucket, or reports how long to wait.
    pub async fn try_admit(&self) -> Admission {
        let now_ms = unix_millis(self.clock.now());
        let minute = now_ms / millis(BUCKET_LENGTH);

        let mut bucket = self.bucket.lock().await;
        if bucket.minute != minute {
            *bucket = MinuteBucket { minute, used: 0 };
        }

        if bucket.used < self.quota {
            bucket.used += 1;
            Admission::Admitted
        } else {
            let next_bucket_ms = (minute + 1) * millis(BUCKET_LENGTH);
            Admission::Wait(Duration::from_millis(next_bucket_ms - now_ms))
        }
    }

    /// Waits until the current minute bucket has room, then takes a slot.
    pub async fn acquire(&self) {
        loop {
            match self.try_admit().await {
                Admission::Admitted => return,
                Admission::Wait(delay) => {
                    info!(
                        quota = self.quota,
                        wait_ms = delay.as_millis(),
                        "rate limited; waiting for the next minute"
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }

    /// Requests already admitted in the bucket that contains "now".
    pub async fn used_in_current_minute(&self) -> u32 {
        let minute = unix_millis(self.clock.now()) / millis(BUCKET_LENGTH);
        let bucket = self.bucket.lock().await;
        if bucket.minute == minute { bucket.used } else { 0 }
    }

    /// Time remaining until the next minute bucket starts.
    #[must_use]
    pub fn until_next_minute(&self) -> Duration {
        let now_ms = unix_millis(self.clock.now());
        let bucket_ms = millis(BUCKET_LENGTH);
        Duration::from_millis(bucket_ms - now_ms % bucket_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn unix_millis(time: SystemTime) -> u64 {
    millis(time.duration_since(UNIX_EPOCH).unwrap_or_default())
}

/// Parses a `RateLimit-Reset` header (Unix epoch seconds) into a delay from `now`.
///
/// A reset time in the past yields zero. Values beyond one hour are capped.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use wanikani_deck_core::api::rate_limiter::parse_rate_limit_reset;
///
/// let now = UNIX_EPOCH + Duration::from_secs(1_000);
/// assert_eq!(parse_rate_limit_reset("1030", now), Some(Duration::from_secs(30)));
/// assert_eq!(parse_rate_limit_reset("900", now), Some(Duration::ZERO));
/// assert_eq!(parse_rate_limit_reset("soon", now), None);
/// ```
#[must_use]
pub fn parse_rate_limit_reset(header_value: &str, now: SystemTime) -> Option<Duration> {
    let Ok(reset_secs) = header_value.trim().parse::<u64>() else {
        debug!(header_value, "unparseable RateLimit-Reset value");
        return None;
    };

    let reset_at = UNIX_EPOCH + Duration::from_secs(reset_secs);
    let delay = reset_at.duration_since(now).unwrap_or(Duration::ZERO);
    Some(cap_backoff(delay))
}

/// Parses a Retry-After header value into a delay from `now`.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use wanikani_deck_core::api::rate_limiter::parse_retry_after;
///
/// let now = SystemTime::now();
/// assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid", now), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str, now: SystemTime) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        let seconds = u64::try_from(seconds).ok()?;
        return Some(cap_backoff(Duration::from_secs(seconds)));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let delay = datetime.duration_since(now).unwrap_or(Duration::ZERO);
        Some(cap_backoff(delay))
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}

fn cap_backoff(delay: Duration) -> Duration {
    if delay > MAX_THROTTLE_BACKOFF {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_THROTTLE_BACKOFF.as_secs(),
            "throttle backoff exceeds maximum, capping at 1 hour"
        );
        MAX_THROTTLE_BACKOFF
    } else {
        delay
    }
}
