//! Fetch-record builder and the cache-or-fetch protocol
//!
//! This module turns one HTTP GET into a [`FetchRecord`]:
//! 1. Issue the request through the retrying client
//! 2. Build the metadata envelope (status, timing, headers, body hash, timestamp)
//! 3. On a non-ok status, attach empty data and stop
//! 4. Otherwise parse the body and attach the parser output
//!
//! [`Fetcher`] layers the cache on top: a cached successful record is
//! returned without touching the network, and every fetched record is
//! stored, whether ok or not.

use crate::cache::{FetchRecord, PageCache, ResponseMeta};
use crate::config::{CacheConfig, HttpConfig};
use crate::crawler::client::{RawResponse, RetryingClient};
use crate::crawler::observer::{FetchObserver, TracingObserver};
use crate::crawler::parser::{Document, PageParser};
use crate::{CrawlError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Where a record handed out by [`Fetcher::fetch_cached`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Issued a network request and stored the result
    Network,
    /// Restored from the cache
    Cache,
}

/// Fetches `url` and parses it with `parser`
///
/// The parser is only invoked when the response is ok; otherwise the record
/// carries an empty data object. Parser failures are returned as
/// [`CrawlError::Parse`] with the offending URL attached.
///
/// Nothing is written to the cache here.
pub async fn fetch_and_parse<P>(
    client: &RetryingClient,
    url: &str,
    timeout: Duration,
    parser: &P,
) -> Result<FetchRecord>
where
    P: PageParser + ?Sized,
{
    fetch_with(client, url, timeout, |document| {
        let output = parser
            .parse(document)
            .map_err(|cause| CrawlError::parse(url, cause))?;
        serde_json::to_value(output).map_err(|e| CrawlError::parse(url, e))
    })
    .await
}

/// Fetches `url` and builds its record with a custom extraction step
///
/// `extract` runs synchronously on the parsed document, only for ok responses.
pub async fn fetch_with<F>(
    client: &RetryingClient,
    url: &str,
    timeout: Duration,
    extract: F,
) -> Result<FetchRecord>
where
    F: FnOnce(&Document) -> Result<Value>,
{
    let response = client.get(url, timeout).await?;
    build_record(&response, extract)
}

/// Builds the record for a response.
///
/// Kept synchronous so the parsed document never lives across an await.
fn build_record<F>(response: &RawResponse, extract: F) -> Result<FetchRecord>
where
    F: FnOnce(&Document) -> Result<Value>,
{
    let meta = ResponseMeta::from_response(response);
    if !meta.ok {
        return Ok(meta.without_data());
    }

    let document = Document::parse(&response.body, response.url.clone());
    let data = extract(&document)?;
    Ok(meta.with_data(data))
}

/// Cache-or-fetch helper shared by the crawler and the link scraper
///
/// Cloning is cheap; clones share the client, cache directory and observer.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<RetryingClient>,
    cache: PageCache,
    timeout: Duration,
    use_cache: bool,
    observer: Arc<dyn FetchObserver>,
}

impl Fetcher {
    /// Creates a fetcher with caching enabled and a quiet tracing observer
    pub fn new(client: RetryingClient, cache: PageCache, timeout: Duration) -> Self {
        Self {
            client: Arc::new(client),
            cache,
            timeout,
            use_cache: true,
            observer: Arc::new(TracingObserver::default()),
        }
    }

    /// Builds a fetcher from the `[http]` and `[cache]` configuration sections
    pub fn from_config(http: &HttpConfig, cache: &CacheConfig) -> Result<Self> {
        let client = RetryingClient::from_config(http)?;
        let page_cache = PageCache::open(&cache.output_directory)?;
        Ok(Self::new(client, page_cache, http.timeout())
            .with_cache_enabled(cache.enabled)
            .with_observer(Arc::new(TracingObserver::new(cache.verbose))))
    }

    /// Enables or disables cache lookups; fetched records are stored either way
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Replaces the event observer
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache_enabled(&self) -> bool {
        self.use_cache
    }

    pub fn observer(&self) -> &dyn FetchObserver {
        self.observer.as_ref()
    }

    /// Fetches and parses `url` without consulting or writing the cache
    pub async fn fetch_and_parse<P>(&self, url: &str, parser: &P) -> Result<FetchRecord>
    where
        P: PageParser + ?Sized,
    {
        fetch_and_parse(&self.client, url, self.timeout, parser).await
    }

    /// Returns the cached record for `url`, or fetches, stores and returns it
    ///
    /// With caching enabled, a URL whose last stored record is ok is never
    /// requested again. Fetched records are stored even when not ok, which
    /// replaces any earlier successful entry for the same URL.
    pub async fn fetch_cached<P>(&self, url: &str, parser: &P) -> Result<FetchRecord>
    where
        P: PageParser + ?Sized,
    {
        self.fetch_cached_with(url, |document| {
            let output = parser
                .parse(document)
                .map_err(|cause| CrawlError::parse(url, cause))?;
            serde_json::to_value(output).map_err(|e| CrawlError::parse(url, e))
        })
        .await
        .map(|(record, _)| record)
    }

    /// Cache-or-fetch with a custom extraction step; also reports where the
    /// record came from
    pub async fn fetch_cached_with<F>(
        &self,
        url: &str,
        extract: F,
    ) -> Result<(FetchRecord, RecordSource)>
    where
        F: FnOnce(&Document) -> Result<Value>,
    {
        let outcome = self.cache_or_fetch(url, extract).await;
        if let Err(e) = &outcome {
            self.observer.on_error(url, e);
        }
        outcome
    }

    async fn cache_or_fetch<F>(&self, url: &str, extract: F) -> Result<(FetchRecord, RecordSource)>
    where
        F: FnOnce(&Document) -> Result<Value>,
    {
        if self.use_cache {
            if let Some(record) = self.cache.restore(url)? {
                self.observer.on_restored(url, &record);
                return Ok((record, RecordSource::Cache));
            }
        }

        self.observer.on_fetch_start(url);
        let record = fetch_with(&self.client, url, self.timeout, extract).await?;
        self.cache.store(url, &record)?;
        self.observer.on_fetched(url, &record);
        Ok((record, RecordSource::Network))
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("client", &self.client)
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}
