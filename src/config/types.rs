use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Pagetrail
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Retrying HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum number of retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Per-attempt timeout
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Response statuses that trigger a retry
    #[serde(rename = "retry-status-codes", default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,
}

impl HttpConfig {
    /// The per-attempt timeout as a `Duration`
    ///
    /// Non-finite or negative values fall back to the default timeout; the
    /// validator rejects them before this is reached.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_timeout_seconds()))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: None,
            retry_status_codes: default_retry_status_codes(),
        }
    }
}

/// Cache directory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Restore records from the cache before fetching
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding the `chunk_<hash>.json` entries
    #[serde(rename = "output-directory")]
    pub output_directory: PathBuf,

    /// Log every fetch and restore at info level
    #[serde(default)]
    pub verbose: bool,
}

/// Sequential crawler configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlerConfig {
    /// First page of the pagination chain
    #[serde(rename = "start-link", default)]
    pub start_link: Option<String>,

    /// Maximum number of pages visited per run
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Link scraper configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScraperConfig {
    /// Links to visit
    #[serde(default)]
    pub links: Vec<String>,

    /// Keep only the first `limit` links
    #[serde(default)]
    pub limit: Option<usize>,

    /// Parallel workers; -1 requests every available unit
    #[serde(rename = "n-jobs", default)]
    pub n_jobs: Jobs,

    /// Execution backend for the workers
    #[serde(default)]
    pub backend: Backend,
}

/// Requested degree of parallelism
///
/// Written as an integer in TOML: `-1` for [`Jobs::All`], a positive count
/// otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum Jobs {
    /// Every available unit of the chosen backend
    #[default]
    All,
    /// A fixed number of workers
    Fixed(usize),
}

impl TryFrom<i64> for Jobs {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::All),
            n if n >= 1 => usize::try_from(n)
                .map(Self::Fixed)
                .map_err(|_| format!("n-jobs {n} is too large")),
            n => Err(format!("n-jobs must be -1 or >= 1, got {n}")),
        }
    }
}

/// How link scraper workers are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Concurrent futures polled by the calling task
    Tasks,
    /// Spawned runtime tasks spread over the worker threads
    #[default]
    Threads,
}

/// Configuration-driven page parser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserConfig {
    /// Output field name mapped to a CSS selector
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// How the crawler finds the following page
    #[serde(rename = "next-link", default)]
    pub next_link: Option<NextLinkRule>,
}

/// Rule for locating the next page link
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum NextLinkRule {
    /// The `href` of the first element matching `selector`
    Anchor { selector: String },
    /// The anchor following the current page among those matching `selector`
    AfterCurrent { selector: String },
}

impl NextLinkRule {
    pub fn selector(&self) -> &str {
        match self {
            Self::Anchor { selector } | Self::AfterCurrent { selector } => selector,
        }
    }
}

fn default_max_retries() -> u32 {
    10
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_timeout_seconds() -> f64 {
    10.0
}

fn default_retry_status_codes() -> Vec<u16> {
    crate::crawler::DEFAULT_RETRY_STATUS_CODES.to_vec()
}

fn default_true() -> bool {
    true
}
