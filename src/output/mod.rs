//! Output module for reporting on cache directories
//!
//! The crawler and the link scraper keep their results on disk. This module
//! summarizes what a cache directory holds for the `stats` command.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CacheStatistics};
