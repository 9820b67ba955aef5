//! Statistics generation from a cache directory
//!
//! This module provides functionality for summarizing and displaying the
//! entries a crawl or scrape left in its output directory.

use crate::cache::PageCache;
use crate::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Cache directory statistics summary
#[derive(Debug, Clone, Default)]
pub struct CacheStatistics {
    /// Number of `chunk_*.json` files
    pub total_entries: u64,

    /// Entries recording a successful fetch
    pub ok_entries: u64,

    /// Entries recording a failed fetch
    pub not_ok_entries: u64,

    /// Count of entries by HTTP status code
    pub status_codes: BTreeMap<u16, u64>,

    /// Successful entries whose data carries a next page link
    pub with_next_link: u64,

    /// Total fetch time across all entries, in seconds
    pub total_elapsed_seconds: f64,

    /// Oldest and newest fetch timestamps
    pub first_fetched: Option<String>,
    pub last_fetched: Option<String>,

    /// Files that could not be decoded, with the reason
    pub malformed: Vec<(PathBuf, String)>,
}

/// Loads statistics from a cache directory
///
/// # Returns
///
/// * `Ok(CacheStatistics)` - Successfully scanned the directory
/// * `Err(CrawlError)` - The directory could not be listed
pub fn load_statistics(cache: &PageCache) -> Result<CacheStatistics> {
    let mut stats = CacheStatistics::default();

    for entry in cache.entries()? {
        stats.total_entries += 1;

        let record = match entry.record {
            Ok(Some(record)) => record,
            Ok(None) => {
                // Failed fetch without a complete record
                stats.not_ok_entries += 1;
                continue;
            }
            Err(e) => {
                stats.malformed.push((entry.path, e.to_string()));
                continue;
            }
        };

        if record.ok() {
            stats.ok_entries += 1;
            if record.next_link().is_some() {
                stats.with_next_link += 1;
            }
        } else {
            stats.not_ok_entries += 1;
        }

        *stats.status_codes.entry(record.status_code()).or_insert(0) += 1;
        stats.total_elapsed_seconds += record.elapsed_seconds();

        // Timestamps share one fixed-width format, so they order as strings
        let timestamp = record.timestamp();
        if stats
            .first_fetched
            .as_deref()
            .map_or(true, |first| timestamp < first)
        {
            stats.first_fetched = Some(timestamp.to_string());
        }
        if stats
            .last_fetched
            .as_deref()
            .map_or(true, |last| timestamp > last)
        {
            stats.last_fetched = Some(timestamp.to_string());
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CacheStatistics) {
    println!("=== Cache Statistics ===\n");

    println!("Overview:");
    println!("  Total entries: {}", stats.total_entries);
    println!("  Ok: {}", stats.ok_entries);
    println!("  Not ok: {}", stats.not_ok_entries);
    println!("  Malformed: {}", stats.malformed.len());
    println!("  Pages with a next link: {}", stats.with_next_link);
    println!();

    if !stats.status_codes.is_empty() {
        println!("Status Codes:");
        for (code, count) in &stats.status_codes {
            let percentage = if stats.total_entries > 0 {
                (*count as f64 / stats.total_entries as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", code, count, percentage);
        }
        println!();
    }

    if let (Some(first), Some(last)) = (&stats.first_fetched, &stats.last_fetched) {
        println!("Fetched between {} and {}", first, last);
        println!("Total fetch time: {:.1}s", stats.total_elapsed_seconds);
        println!();
    }

    if !stats.malformed.is_empty() {
        println!("Malformed Entries ({}):", stats.malformed.len());
        for (path, reason) in &stats.malformed {
            println!("  - {}: {}", path.display(), reason);
        }
        println!();
    }

    let success_rate = if stats.total_entries > 0 {
        (stats.ok_entries as f64 / stats.total_entries as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} entries restorable)",
        success_rate, stats.ok_entries, stats.total_entries
    );
}
