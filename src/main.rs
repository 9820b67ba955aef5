//! Pagetrail main entry point
//!
//! This is the command-line interface for the Pagetrail page crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pagetrail::config::{load_config_with_hash, Config};
use pagetrail::crawler::{Crawler, Fetcher, LinkScraper, SelectorParser};
use pagetrail::output::{load_statistics, print_statistics};
use pagetrail::{CrawlError, PageCache};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pagetrail: a resumable, content-addressed page crawler
///
/// Pagetrail follows paginated listings or scrapes a fixed list of links,
/// extracts fields with CSS selectors, and stores every page as a JSON file
/// named after the hash of its URL. Re-running a command restores pages
/// already fetched instead of requesting them again.
#[derive(Parser, Debug)]
#[command(name = "pagetrail")]
#[command(version)]
#[command(about = "A resumable, content-addressed page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Always fetch from the network (fetched pages are still stored)
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Follow the pagination chain from `crawler.start-link`
    Crawl,
    /// Visit every link of `scraper.links` in parallel
    Scrape,
    /// Summarize the cache directory and exit
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.no_cache {
        config.cache.enabled = false;
    }

    match cli.command {
        Command::Crawl => handle_crawl(&config).await,
        Command::Scrape => handle_scrape(&config).await,
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagetrail=info,warn"),
            1 => EnvFilter::new("pagetrail=debug,info"),
            2 => EnvFilter::new("pagetrail=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels the returned token on the first Ctrl-C
fn install_interrupt_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            handle.cancel();
        }
    });
    token
}

/// Handles the `crawl` command: follows the pagination chain
async fn handle_crawl(config: &Config) -> anyhow::Result<()> {
    let Some(start_link) = config.crawler.start_link.as_deref() else {
        anyhow::bail!("crawl requires `start-link` in the [crawler] section");
    };

    let parser = SelectorParser::from_config(&config.parser)?;
    if !parser.follows_links() {
        tracing::warn!(
            "No [parser.next-link] rule configured; only {} will be visited",
            start_link
        );
    }

    let fetcher = Fetcher::from_config(&config.http, &config.cache)?;
    let mut crawler = Crawler::from_config(&config.crawler, parser, fetcher)
        .with_cancellation(install_interrupt_handler());

    let summary = crawler.run().await.context("crawl aborted")?;

    println!(
        "Crawled {} page(s): {} fetched, {} restored",
        summary.pages, summary.fetched, summary.restored
    );
    if let Some(link) = crawler.cursor().link() {
        println!("Stopped before {}", link);
    }
    Ok(())
}

/// Handles the `scrape` command: visits every configured link
async fn handle_scrape(config: &Config) -> anyhow::Result<()> {
    if config.scraper.links.is_empty() {
        tracing::warn!("The [scraper] section lists no links");
    }

    let parser = SelectorParser::from_config(&config.parser)?;
    let fetcher = Fetcher::from_config(&config.http, &config.cache)?;
    let scraper = LinkScraper::from_config(&config.scraper, parser, fetcher)
        .with_cancellation(install_interrupt_handler());

    match scraper.run().await {
        Ok(summary) => {
            println!(
                "Scraped {} link(s): {} fetched, {} restored, {} not ok, {} skipped",
                summary.total, summary.fetched, summary.restored, summary.not_ok, summary.skipped
            );
            Ok(())
        }
        Err(CrawlError::LinksFailed { failures, summary }) => {
            for failure in &failures {
                eprintln!("  - {}: {}", failure.url, failure.error);
            }
            anyhow::bail!(
                "{} of {} link(s) failed ({} fetched, {} restored)",
                failures.len(),
                summary.total,
                summary.fetched,
                summary.restored
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles the `stats` command: summarizes the cache directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Cache directory: {}\n", config.cache.output_directory.display());

    let cache = PageCache::open(&config.cache.output_directory)?;
    let stats = load_statistics(&cache)?;
    print_statistics(&stats);

    Ok(())
}
