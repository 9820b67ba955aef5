//! Integration tests for Pagetrail
//!
//! These tests use wiremock to serve pages and exercise the client, the
//! cache and both engines end-to-end against a temporary cache directory.

mod cache_tests;
mod client_tests;
mod crawl_tests;
mod scrape_tests;
