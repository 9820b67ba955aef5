//! Pagetrail: a resumable, content-addressed page crawler
//!
//! This crate fetches paginated and flat lists of web pages, extracts
//! structured data from their HTML, and persists every fetched page as a
//! content-addressed cache entry so repeated runs are idempotent and
//! resumable.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by page parsers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for Pagetrail operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error for {url} after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("Parse error for {url}: {cause}")]
    Parse {
        url: String,
        #[source]
        cause: BoxError,
    },

    #[error("Malformed cache entry {}: {reason}", .path.display())]
    MalformedCache { path: PathBuf, reason: String },

    #[error("Cache I/O error for {}: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scrape worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("{} of {} link(s) failed", .failures.len(), .summary.total)]
    LinksFailed {
        failures: Vec<crawler::LinkFailure>,
        summary: crawler::ScrapeSummary,
    },
}

impl CrawlError {
    /// Wraps a parser failure together with the page it happened on
    pub fn parse(url: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Parse {
            url: url.into(),
            cause: cause.into(),
        }
    }

    /// Returns the URL this error is attached to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. } | Self::Parse { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Pagetrail operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use cache::{hash_key, FetchRecord, PageCache};
pub use config::Config;
pub use crawler::{
    Crawler, Document, FetchObserver, Fetcher, LinkScraper, PageParser, PaginatedParser,
    RetryingClient,
};
