//! Fetch event hooks
//!
//! The engines never print. They report what happens to each link through a
//! [`FetchObserver`], and the default [`TracingObserver`] turns those events
//! into `tracing` log lines.

use crate::cache::FetchRecord;
use crate::CrawlError;

/// Receives fetch events from the crawler and the link scraper
///
/// Implementations must be thread-safe: the link scraper reports from
/// several workers at once. Every method has an empty default body.
pub trait FetchObserver: Send + Sync {
    /// A network fetch is about to start
    fn on_fetch_start(&self, _url: &str) {}

    /// A record was served from the cache instead of the network
    fn on_restored(&self, _url: &str, _record: &FetchRecord) {}

    /// A record was fetched and stored in the cache
    fn on_fetched(&self, _url: &str, _record: &FetchRecord) {}

    /// Fetching or parsing `url` failed
    fn on_error(&self, _url: &str, _error: &CrawlError) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

/// Logs fetch events through `tracing`
///
/// Fetch and restore events are logged at `info` when verbose and at
/// `debug` otherwise. Non-ok responses and errors are always logged at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    verbose: bool,
}

impl TracingObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl FetchObserver for TracingObserver {
    fn on_fetch_start(&self, url: &str) {
        if self.verbose {
            tracing::info!("Fetching {}", url);
        } else {
            tracing::debug!("Fetching {}", url);
        }
    }

    fn on_restored(&self, url: &str, record: &FetchRecord) {
        if self.verbose {
            tracing::info!("Restoring {} (cached {})", url, record.timestamp());
        } else {
            tracing::debug!("Restoring {} (cached {})", url, record.timestamp());
        }
    }

    fn on_fetched(&self, url: &str, record: &FetchRecord) {
        if !record.ok() {
            tracing::warn!(
                "GET {} returned {} {}",
                url,
                record.status_code(),
                record.reason()
            );
        } else if self.verbose {
            tracing::info!(
                "Fetched {} ({}, {:.3}s)",
                url,
                record.status_code(),
                record.elapsed_seconds()
            );
        } else {
            tracing::debug!(
                "Fetched {} ({}, {:.3}s)",
                url,
                record.status_code(),
                record.elapsed_seconds()
            );
        }
    }

    fn on_error(&self, url: &str, error: &CrawlError) {
        tracing::warn!("Failed {}: {}", url, error);
    }
}
