//! Retrying HTTP client
//!
//! This module wraps a `reqwest::Client` with:
//! - Bounded automatic retries on retryable status codes
//! - Retries on transient transport failures (connect errors, timeouts)
//! - Exponential backoff between attempts
//! - An optional static User-Agent applied to every request
//!
//! Callers always receive either the final HTTP response, which may still
//! carry an error status, or a transport error once retries are exhausted.

use crate::config::HttpConfig;
use crate::{CrawlError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use url::Url;

/// Status codes retried when no explicit list is configured
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Ceiling applied to any single backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Retry configuration, built once per client instance
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first one
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds
    pub backoff_factor: f64,

    /// Status codes that trigger a retry
    pub retry_status_codes: BTreeSet<u16>,

    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_factor: 1.0,
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default retryable status codes
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
            ..Self::default()
        }
    }

    /// Whether a response with this status should be retried
    pub fn is_retryable(&self, status_code: u16) -> bool {
        self.retry_status_codes.contains(&status_code)
    }

    /// Delay before retry number `retry` (1-based):
    /// `backoff_factor * 2^(retry - 1)` seconds, capped at `max_backoff`
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1).min(62) as i32;
        let seconds = self.backoff_factor * 2f64.powi(exponent);
        if !seconds.is_finite() || seconds >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(seconds)
        }
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Canonical reason phrase for the status
    pub reason: String,

    /// Final URL after redirects
    pub url: Url,

    /// Charset declared by the Content-Type header
    pub encoding: Option<String>,

    /// Time from sending the request until response headers arrived
    pub elapsed: Duration,

    /// Response headers; repeated names are joined with ", "
    pub headers: BTreeMap<String, String>,

    /// Decoded body text
    pub body: String,
}

impl RawResponse {
    /// HTTP-level success: any status below 400
    pub fn is_ok(&self) -> bool {
        self.status_code < 400
    }

    async fn read(response: reqwest::Response, elapsed: Duration) -> reqwest::Result<Self> {
        let status = response.status();
        let url = response.url().clone();
        let headers = flatten_headers(response.headers());
        let encoding = charset(response.headers());
        let body = response.text().await?;

        Ok(Self {
            status_code: status.as_u16(),
            reason: reason_phrase(status),
            url,
            encoding,
            elapsed,
            headers,
            body,
        })
    }
}

/// HTTP client with bounded retries and exponential backoff
///
/// The client is cheap to share: `reqwest::Client` keeps its connection pool
/// behind an `Arc`, and the retry policy is immutable.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    inner: Client,
    policy: RetryPolicy,
    user_agent: Option<String>,
}

impl RetryingClient {
    /// Builds a client from an explicit policy and optional User-Agent
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pagetrail::crawler::{RetryPolicy, RetryingClient};
    ///
    /// let client = RetryingClient::new(RetryPolicy::new(3, 0.5), Some("Chrome")).unwrap();
    /// assert_eq!(client.user_agent(), Some("Chrome"));
    /// ```
    pub fn new(policy: RetryPolicy, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true);

        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }

        Ok(Self {
            inner: builder.build()?,
            policy,
            user_agent: user_agent.map(str::to_string),
        })
    }

    /// Builds a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            retry_status_codes: config.retry_status_codes.iter().copied().collect(),
            max_backoff: MAX_BACKOFF,
        };
        Self::new(policy, config.user_agent.as_deref())
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The User-Agent sent with every request, if one was configured
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Issues a GET request, retrying transparently
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Status in retry list | Retry while attempts remain, then return the response |
    /// | Other status (2xx, 3xx, 4xx, ...) | Return immediately |
    /// | Timeout / connection error | Retry while attempts remain, then `Transport` error |
    /// | Invalid request (e.g. bad URL) | `Transport` error, no retry |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Per-attempt timeout
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<RawResponse> {
        let mut retries = 0u32;

        loop {
            let started = Instant::now();
            let outcome = self.inner.get(url).timeout(timeout).send().await;
            let can_retry = retries < self.policy.max_retries;

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if can_retry && self.policy.is_retryable(status) {
                        retries += 1;
                        tracing::debug!(
                            "GET {} returned {}, retry {}/{}",
                            url,
                            status,
                            retries,
                            self.policy.max_retries
                        );
                        tokio::time::sleep(self.policy.backoff(retries)).await;
                        continue;
                    }

                    let elapsed = started.elapsed();
                    return RawResponse::read(response, elapsed).await.map_err(|source| {
                        CrawlError::Transport {
                            url: url.to_string(),
                            attempts: retries + 1,
                            source,
                        }
                    });
                }
                Err(e) => {
                    if can_retry && is_transient(&e) {
                        retries += 1;
                        tracing::debug!(
                            "GET {} failed ({}), retry {}/{}",
                            url,
                            e,
                            retries,
                            self.policy.max_retries
                        );
                        tokio::time::sleep(self.policy.backoff(retries)).await;
                        continue;
                    }

                    return Err(CrawlError::Transport {
                        url: url.to_string(),
                        attempts: retries + 1,
                        source: e,
                    });
                }
            }
        }
    }
}

/// Classifies transport errors worth another attempt
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("").to_string()
}

/// Flattens a header map; values that are not valid UTF-8 are decoded lossily
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}

/// Extracts the `charset` parameter of the Content-Type header
fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}
