//! Sequential pagination engine
//!
//! The crawler follows one chain of "next link" pointers. Its only state is
//! a cursor:
//!
//! ```text
//! Active(start) --page has next link--> Active(next) --...--> Done
//!        \--------no next link / limit reached / cancelled------^
//! ```
//!
//! Each step goes through the cache-or-fetch protocol, so pages stored by an
//! earlier run are restored instead of fetched. Results live in the cache,
//! not in memory.

use crate::cache::FetchRecord;
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{Fetcher, RecordSource};
use crate::crawler::parser::PaginatedParser;
use crate::{CrawlError, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Key under which the next page link is stored in a crawled record's data
pub const NEXT_LINK_KEY: &str = "next_link";

/// The crawler's position in the pagination chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// The next link to visit
    Active(String),
    /// Nothing left to visit
    Done,
}

impl Cursor {
    fn from_link(link: Option<String>) -> Self {
        match link {
            Some(link) => Self::Active(link),
            None => Self::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The link the crawler will visit next, if any
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Active(link) => Some(link),
            Self::Done => None,
        }
    }
}

/// Counters for one call to [`Crawler::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages visited, from the network or the cache
    pub pages: usize,

    /// Pages fetched over the network
    pub fetched: usize,

    /// Pages restored from the cache
    pub restored: usize,

    /// The last link visited
    pub last_link: Option<String>,
}

/// Sequential crawler over a paginated listing
///
/// # Example
///
/// ```no_run
/// use pagetrail::crawler::{Crawler, Document, Fetcher, PageParser, PaginatedParser};
/// use pagetrail::BoxError;
///
/// struct Listing;
///
/// impl PageParser for Listing {
///     type Output = serde_json::Value;
///
///     fn parse(&self, doc: &Document) -> Result<Self::Output, BoxError> {
///         Ok(serde_json::json!({ "title": doc.text("h1")? }))
///     }
/// }
///
/// impl PaginatedParser for Listing {
///     fn next_link(&self, doc: &Document, _current: &str) -> Result<Option<String>, BoxError> {
///         doc.link("a.next")
///     }
/// }
///
/// # async fn example(fetcher: Fetcher) -> pagetrail::Result<()> {
/// let mut crawler = Crawler::new(Some("https://example.com/list"), Listing, fetcher)
///     .with_limit(Some(10));
/// let summary = crawler.run().await?;
/// println!("visited {} pages", summary.pages);
/// # Ok(())
/// # }
/// ```
pub struct Crawler<P> {
    parser: P,
    fetcher: Fetcher,
    cursor: Cursor,
    limit: Option<usize>,
    cancel: CancellationToken,
}

impl<P: PaginatedParser> Crawler<P> {
    /// Creates a crawler starting at `start_link`
    ///
    /// A `None` start link yields a crawler that is already done.
    pub fn new(start_link: Option<impl Into<String>>, parser: P, fetcher: Fetcher) -> Self {
        Self {
            parser,
            fetcher,
            cursor: Cursor::from_link(start_link.map(Into::into)),
            limit: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a crawler from the `[crawler]` configuration section
    pub fn from_config(config: &CrawlerConfig, parser: P, fetcher: Fetcher) -> Self {
        Self::new(config.start_link.clone(), parser, fetcher).with_limit(config.limit)
    }

    /// Caps the number of pages visited per [`run`](Self::run)
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Installs a token that stops the crawl before the next page
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Follows the pagination chain until it ends, the limit is reached, or
    /// the crawl is cancelled
    ///
    /// A parse or transport error aborts the crawl. The cursor keeps
    /// pointing at the failing link, so a later run resumes there, and pages
    /// already visited are restored from the cache.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();

        if self.limit == Some(0) {
            self.cursor = Cursor::Done;
        }

        while let Cursor::Active(link) = &self.cursor {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled before {}", link);
                break;
            }

            let link = link.clone();
            let (record, source) = self.step(&link).await?;

            summary.pages += 1;
            match source {
                RecordSource::Network => summary.fetched += 1,
                RecordSource::Cache => summary.restored += 1,
            }
            summary.last_link = Some(link);

            let limit_reached = self.limit.is_some_and(|limit| summary.pages >= limit);
            self.cursor = if limit_reached {
                tracing::debug!("Iteration limit reached after {} page(s)", summary.pages);
                Cursor::Done
            } else {
                Cursor::from_link(record.next_link().map(str::to_string))
            };
        }

        tracing::info!(
            "Crawl finished: {} page(s), {} fetched, {} restored",
            summary.pages,
            summary.fetched,
            summary.restored
        );
        Ok(summary)
    }

    /// Visits one page: cache-or-fetch with data and next link extraction
    async fn step(&self, link: &str) -> Result<(FetchRecord, RecordSource)> {
        let parser = &self.parser;
        let (record, source) = self
            .fetcher
            .fetch_cached_with(link, |document| {
                let output = parser
                    .parse(document)
                    .map_err(|cause| CrawlError::parse(link, cause))?;
                let next_link = parser
                    .next_link(document, link)
                    .map_err(|cause| CrawlError::parse(link, cause))?;

                let mut data = match serde_json::to_value(output) {
                    Ok(Value::Object(data)) => data,
                    Ok(_) => {
                        return Err(CrawlError::parse(
                            link,
                            "paginated page data must serialize to a JSON object",
                        ))
                    }
                    Err(e) => return Err(CrawlError::parse(link, e)),
                };
                data.insert(
                    NEXT_LINK_KEY.to_string(),
                    next_link.map_or(Value::Null, Value::String),
                );
                Ok(Value::Object(data))
            })
            .await?;

        if !record.ok() {
            tracing::warn!(
                "Pagination stops at {}: HTTP {} {}",
                link,
                record.status_code(),
                record.reason()
            );
        }

        Ok((record, source))
    }
}
