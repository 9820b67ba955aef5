//! Configuration module for Pagetrail
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagetrail::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagetrail.toml")).unwrap();
//! println!("Retries per request: {}", config.http.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Backend, CacheConfig, Config, CrawlerConfig, HttpConfig, Jobs, NextLinkRule, ParserConfig,
    ScraperConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
