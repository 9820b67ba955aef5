//! Crawler module for page fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retries and exponential backoff
//! - The parser contract and HTML helpers
//! - The cache-or-fetch protocol
//! - The sequential pagination crawler and the parallel link scraper

mod client;
mod fanout;
mod fetcher;
mod observer;
mod paginator;
mod parser;
mod selectors;

pub use client::{RawResponse, RetryPolicy, RetryingClient, DEFAULT_RETRY_STATUS_CODES, MAX_BACKOFF};
pub use fanout::{pool_size, LinkFailure, LinkScraper, ScrapeSummary, THREAD_POOL_DEFAULT};
pub use fetcher::{fetch_and_parse, fetch_with, Fetcher, RecordSource};
pub use observer::{FetchObserver, NoopObserver, TracingObserver};
pub use paginator::{CrawlSummary, Crawler, Cursor, NEXT_LINK_KEY};
pub use parser::{compile, resolve_link, Document, PageParser, PaginatedParser};
pub use selectors::SelectorParser;
