//! Parallel fan-out engine
//!
//! The link scraper visits a fixed list of independent links through the
//! cache-or-fetch protocol with bounded parallelism. Workers share the
//! retrying client and the cache directory and nothing else; each link maps
//! to its own cache file.
//!
//! Failures are isolated per link. The run always drains every dispatched
//! link, then reports all failures together.

use crate::config::{Backend, Jobs, ScraperConfig};
use crate::crawler::fetcher::{Fetcher, RecordSource};
use crate::crawler::parser::PageParser;
use crate::{CrawlError, Result};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Pool size used by the thread backend when every unit is requested
pub const THREAD_POOL_DEFAULT: usize = 30;

/// One link that could not be fetched or parsed
#[derive(Debug)]
pub struct LinkFailure {
    pub url: String,
    pub error: CrawlError,
}

/// Counters for one call to [`LinkScraper::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    /// Links in the set
    pub total: usize,

    /// Links fetched over the network
    pub fetched: usize,

    /// Links restored from the cache
    pub restored: usize,

    /// Fetched links whose response was not ok (stored, not restorable)
    pub not_ok: usize,

    /// Links failed with a transport, parse or cache error
    pub failed: usize,

    /// Links never started because the run was cancelled
    pub skipped: usize,
}

/// What happened to a single link
#[derive(Debug)]
enum LinkOutcome {
    Done { source: RecordSource, ok: bool },
    Failed(LinkFailure),
    Skipped,
}

/// Resolves the worker count for a backend
///
/// # Examples
///
/// ```
/// use pagetrail::config::{Backend, Jobs};
/// use pagetrail::crawler::pool_size;
///
/// assert_eq!(pool_size(Jobs::All, Backend::Threads), 30);
/// assert_eq!(pool_size(Jobs::Fixed(4), Backend::Tasks), 4);
/// ```
pub fn pool_size(jobs: Jobs, backend: Backend) -> usize {
    match (jobs, backend) {
        (Jobs::Fixed(n), _) => n.max(1),
        (Jobs::All, Backend::Threads) => THREAD_POOL_DEFAULT,
        (Jobs::All, Backend::Tasks) => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

/// Parallel scraper over a fixed list of links
pub struct LinkScraper<P> {
    links: Vec<String>,
    parser: Arc<P>,
    fetcher: Fetcher,
    jobs: Jobs,
    backend: Backend,
    cancel: CancellationToken,
}

impl<P> LinkScraper<P>
where
    P: PageParser + 'static,
{
    /// Creates a scraper over `links`, keeping only the first `limit` entries
    pub fn new(links: Vec<String>, limit: Option<usize>, parser: P, fetcher: Fetcher) -> Self {
        let mut links = links;
        if let Some(limit) = limit {
            links.truncate(limit);
        }

        Self {
            links,
            parser: Arc::new(parser),
            fetcher,
            jobs: Jobs::All,
            backend: Backend::Threads,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a scraper from the `[scraper]` configuration section
    pub fn from_config(config: &ScraperConfig, parser: P, fetcher: Fetcher) -> Self {
        Self::new(config.links.clone(), config.limit, parser, fetcher)
            .with_jobs(config.n_jobs)
            .with_backend(config.backend)
    }

    pub fn with_jobs(mut self, jobs: Jobs) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Installs a token that stops dispatching new links
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The links this scraper will visit, in order
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Number of links allowed in flight at once
    pub fn pool_size(&self) -> usize {
        pool_size(self.jobs, self.backend)
    }

    /// Visits every link and waits for all of them
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeSummary)` - Every started link produced a record
    /// * `Err(CrawlError::LinksFailed)` - At least one link failed; carries
    ///   every failure and the summary. Records of the other links are cached.
    pub async fn run(&self) -> Result<ScrapeSummary> {
        let workers = self.pool_size();
        tracing::info!(
            "Scraping {} link(s) with {} worker(s) ({:?} backend)",
            self.links.len(),
            workers,
            self.backend
        );

        let outcomes = match self.backend {
            Backend::Tasks => self.run_tasks(workers).await,
            Backend::Threads => self.run_threads(workers).await,
        };

        let mut summary = ScrapeSummary {
            total: self.links.len(),
            ..ScrapeSummary::default()
        };
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                LinkOutcome::Done { source, ok } => {
                    match source {
                        RecordSource::Network => summary.fetched += 1,
                        RecordSource::Cache => summary.restored += 1,
                    }
                    if !ok {
                        summary.not_ok += 1;
                    }
                }
                LinkOutcome::Failed(failure) => {
                    summary.failed += 1;
                    failures.push(failure);
                }
                LinkOutcome::Skipped => summary.skipped += 1,
            }
        }

        tracing::info!(
            "Scrape finished: {} fetched, {} restored, {} not ok, {} failed, {} skipped",
            summary.fetched,
            summary.restored,
            summary.not_ok,
            summary.failed,
            summary.skipped
        );

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(CrawlError::LinksFailed { failures, summary })
        }
    }

    /// Runs links concurrently on the current task
    async fn run_tasks(&self, workers: usize) -> Vec<LinkOutcome> {
        stream::iter(self.links.iter().cloned())
            .map(|link| {
                visit_isolated(
                    self.fetcher.clone(),
                    self.parser.clone(),
                    self.cancel.clone(),
                    link,
                )
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    /// Spawns one runtime task per link, at most `workers` running at once
    async fn run_threads(&self, workers: usize) -> Vec<LinkOutcome> {
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pool = JoinSet::new();

        for link in &self.links {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let parser = self.parser.clone();
            let cancel = self.cancel.clone();
            let link = link.clone();

            pool.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return LinkOutcome::Skipped;
                };
                visit_isolated(fetcher, parser, cancel, link).await
            });
        }

        let mut outcomes = Vec::with_capacity(self.links.len());
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Scrape worker aborted: {}", e);
                    outcomes.push(LinkOutcome::Skipped);
                }
            }
        }
        outcomes
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Visits one link; a panicking parser fails that link only
async fn visit_isolated<P>(
    fetcher: Fetcher,
    parser: Arc<P>,
    cancel: CancellationToken,
    link: String,
) -> LinkOutcome
where
    P: PageParser + ?Sized,
{
    AssertUnwindSafe(visit(fetcher, parser, cancel, link.clone()))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            LinkOutcome::Failed(LinkFailure {
                url: link,
                error: CrawlError::WorkerPanicked(panic_message(panic.as_ref())),
            })
        })
}

async fn visit<P>(
    fetcher: Fetcher,
    parser: Arc<P>,
    cancel: CancellationToken,
    link: String,
) -> LinkOutcome
where
    P: PageParser + ?Sized,
{
    if cancel.is_cancelled() {
        return LinkOutcome::Skipped;
    }

    match fetcher
        .fetch_cached_with(&link, |document| {
            let output = parser
                .parse(document)
                .map_err(|cause| CrawlError::parse(link.as_str(), cause))?;
            serde_json::to_value(output).map_err(|e| CrawlError::parse(link.as_str(), e))
        })
        .await
    {
        Ok((record, source)) => LinkOutcome::Done {
            source,
            ok: record.ok(),
        },
        Err(error) => LinkOutcome::Failed(LinkFailure { url: link, error }),
    }
}
