//! Authenticated, rate-limited HTTP client for the WaniKani API.
//!
//! Every request goes through the shared [`RateLimiter`] before it is sent.
//! A `429 Too Many Requests` response is absorbed here: the client sleeps for
//! the delay the server asked for and sends the same request again.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{
    API_REVISION, API_REVISION_HEADER, CONNECT_TIMEOUT_SECS, RATE_LIMIT_RESET_HEADER,
    READ_TIMEOUT_SECS,
};
use super::error::ApiError;
use super::rate_limiter::{RateLimiter, parse_rate_limit_reset, parse_retry_after};
use crate::user_agent;

/// HTTP client for the WaniKani API and its audio CDN.
///
/// Cheap to clone; clones share the connection pool and the rate limiter.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wanikani_deck_core::api::{ApiClient, RateLimiter, UserResource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = Arc::new(RateLimiter::new(60));
/// let client = ApiClient::new("https://api.wanikani.com/v2/", "my-token", limiter)?;
/// let user: UserResource = client.get_json(&client.endpoint("user")?, &[]).await?;
/// println!("level {}", user.data.level);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    authorization: HeaderValue,
    limiter: Arc<RateLimiter>,
    max_throttle_retries: Option<u32>,
}

impl ApiClient {
    /// Creates a client rooted at `base_url` that authenticates with `token`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` for an unparseable base URL,
    /// `ApiError::InvalidToken` if the token cannot be sent as a header, and
    /// `ApiError::ClientBuild` if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, token: &str, limiter: Arc<RateLimiter>) -> Result<Self, ApiError> {
        // Without a trailing slash `Url::join` would replace the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|_| ApiError::invalid_url(base_url))?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| ApiError::InvalidToken)?;
        authorization.set_sensitive(true);

        let client = build_client(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
            .map_err(ApiError::ClientBuild)?;

        Ok(Self {
            client,
            base_url,
            authorization,
            limiter,
            max_throttle_retries: None,
        })
    }

    /// Caps how many consecutive 429 responses are retried for one request.
    ///
    /// `None` (the default) retries for as long as the server keeps throttling.
    #[must_use]
    pub fn with_max_throttle_retries(mut self, max: Option<u32>) -> Self {
        self.max_throttle_retries = max;
        self
    }

    /// The request gate shared by every call made through this client.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Resolves an endpoint path (e.g. `"subjects"`) against the API root.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|_| ApiError::invalid_url(path))
    }

    /// Sends an authenticated GET through the rate limiter.
    ///
    /// `query` pairs are appended to `url` in order. Throttled responses are
    /// retried after the server-specified delay; any other non-success status
    /// is returned as an error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network`/`Timeout` on transport failure,
    /// `ApiError::HttpStatus` on a non-success status, and
    /// `ApiError::Throttled` when the retry cap is exceeded.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn get(&self, url: &Url, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        let url = &with_query(url, query);
        let mut throttled: u32 = 0;

        loop {
            self.limiter.acquire().await;

            let mut request = self.client.get(url.clone());
            if self.is_api_host(url) {
                request = request
                    .header(AUTHORIZATION, self.authorization.clone())
                    .header(API_REVISION_HEADER, API_REVISION);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ApiError::network(url.as_str(), e))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(max) = self.max_throttle_retries
                    && throttled >= max
                {
                    return Err(ApiError::Throttled {
                        url: url.to_string(),
                        retries: throttled,
                    });
                }
                throttled += 1;

                let delay = self.throttle_delay(response.headers());
                warn!(
                    attempt = throttled,
                    delay_ms = delay.as_millis(),
                    "throttled by server; backing off"
                );
                self.limiter.clock().sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                return Err(ApiError::http_status(url.as_str(), status.as_u16()));
            }

            debug!(status = status.as_u16(), "request succeeded");
            return Ok(response);
        }
    }

    /// Sends a GET and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), plus `ApiError::Decode` when
    /// the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let body = self.get_bytes(url, query).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::decode(url.as_str(), e))
    }

    /// Sends a GET and returns the whole body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get).
    pub async fn get_bytes(&self, url: &Url, query: &[(&str, &str)]) -> Result<Vec<u8>, ApiError> {
        let response = self.get(url, query).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(url.as_str(), e))?;
        Ok(body.to_vec())
    }

    /// Streams the body of `url` into `destination`, replacing it atomically.
    ///
    /// The bytes land in a temporary file next to `destination` which is only
    /// renamed into place once the whole body was written, so an interrupted
    /// download never leaves a truncated file behind.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` for a malformed URL, the errors of
    /// [`get`](Self::get), and `ApiError::Io` on filesystem failure.
    #[instrument(skip(self), fields(url = %url, path = %destination.display()))]
    pub async fn download_to_file(&self, url: &str, destination: &Path) -> Result<u64, ApiError> {
        let parsed = Url::parse(url).map_err(|_| ApiError::invalid_url(url))?;
        let response = self.get(&parsed, &[]).await?;

        let directory = destination.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(directory)
            .map_err(|e| ApiError::io(directory, e))?;
        let (file, temp_path) = temp.into_parts();

        let bytes_written = stream_to_file(
            response,
            url,
            tokio::fs::File::from_std(file),
            &temp_path,
        )
        .await?;

        temp_path
            .persist(destination)
            .map_err(|e| ApiError::io(destination, e.error))?;

        debug!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    /// Audio clips live on a CDN; the bearer token is only sent to the API host.
    fn is_api_host(&self, url: &Url) -> bool {
        url.host_str() == self.base_url.host_str() && url.port() == self.base_url.port()
    }

    fn throttle_delay(&self, headers: &HeaderMap) -> Duration {
        let now = self.limiter.clock().now();

        let from_reset = headers
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_rate_limit_reset(value, now));
        let from_retry_after = || {
            headers
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| parse_retry_after(value, now))
        };

        from_reset
            .or_else(from_retry_after)
            .unwrap_or_else(|| self.limiter.until_next_minute())
    }
}

fn with_query(url: &Url, query: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    url
}

async fn stream_to_file(
    response: Response,
    url: &str,
    file: tokio::fs::File,
    file_path: &Path,
) -> Result<u64, ApiError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ApiError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| ApiError::io(file_path, e))?;

    Ok(bytes_written)
}

fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
}
