//! Integration tests for the sequential crawler

use crate::common::{cache_files, fetcher, mount_page, page, request_count, HeadingParser};
use pagetrail::crawler::{Crawler, Cursor, Document, PageParser, PaginatedParser};
use pagetrail::{BoxError, CrawlError};
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_two_page_chain() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/page1", page("H1", Some(&format!("{base}/page2")))).await;
    mount_page(&server, "/page2", page("H2", None)).await;

    let page1 = format!("{base}/page1");
    let page2 = format!("{base}/page2");
    let fetcher = fetcher(dir.path());
    let cache = fetcher.cache().clone();

    let mut crawler = Crawler::new(Some(page1.as_str()), HeadingParser, fetcher);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.last_link.as_deref(), Some(page2.as_str()));
    assert_eq!(crawler.cursor(), &Cursor::Done);
    assert_eq!(cache_files(dir.path()), 2);

    let first = cache.restore(&page1).unwrap().unwrap();
    assert_eq!(first.data()["heading"], "H1");
    assert_eq!(first.next_link(), Some(page2.as_str()));

    let second = cache.restore(&page2).unwrap().unwrap();
    assert_eq!(second.data()["heading"], "H2");
    assert_eq!(second.data()["next_link"], Value::Null);
    assert_eq!(second.next_link(), None);
}

#[tokio::test]
async fn test_rerun_restores_from_cache() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/page1", page("H1", Some(&format!("{base}/page2")))).await;
    mount_page(&server, "/page2", page("H2", None)).await;

    let page1 = format!("{base}/page1");
    let mut first = Crawler::new(Some(page1.as_str()), HeadingParser, fetcher(dir.path()));
    first.run().await.unwrap();
    let before = std::fs::read(first.fetcher().cache().entry_path(&page1)).unwrap();

    let mut second = Crawler::new(Some(page1.as_str()), HeadingParser, fetcher(dir.path()));
    let summary = second.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.restored, 2);
    assert_eq!(request_count(&server).await, 2);

    let after = std::fs::read(second.fetcher().cache().entry_path(&page1)).unwrap();
    assert_eq!(before, after);

    // A finished crawler stays finished
    let summary = second.run().await.unwrap();
    assert_eq!(summary.pages, 0);
}

#[tokio::test]
async fn test_limit_stops_after_one_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/page1", page("H1", Some(&format!("{base}/page2")))).await;
    mount_page(&server, "/page2", page("H2", None)).await;

    let page1 = format!("{base}/page1");
    let mut crawler =
        Crawler::new(Some(page1.as_str()), HeadingParser, fetcher(dir.path())).with_limit(Some(1));
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(request_count(&server).await, 1);
    assert_eq!(cache_files(dir.path()), 1);
    assert!(crawler.cursor().is_done());
}

#[tokio::test]
async fn test_non_ok_page_ends_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/page1", page("H1", Some(&format!("{base}/missing")))).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let page1 = format!("{base}/page1");
    let missing = format!("{base}/missing");
    let fetcher = fetcher(dir.path());
    let cache = fetcher.cache().clone();
    let mut crawler = Crawler::new(Some(page1.as_str()), HeadingParser, fetcher);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert!(crawler.cursor().is_done());
    assert_eq!(cache_files(dir.path()), 2);

    // Stored, but never restored
    assert!(cache.contains(&missing));
    assert!(cache.restore(&missing).unwrap().is_none());

    // Non-ok records carry empty data, like every other failed fetch
    let raw = std::fs::read_to_string(cache.entry_path(&missing)).unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["data"], serde_json::json!({}));
}

#[tokio::test]
async fn test_parse_error_aborts_with_failing_url() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/page1", page("H1", Some(&format!("{base}/page2")))).await;
    mount_page(
        &server,
        "/page2",
        "<html><body><p>no heading</p></body></html>".to_string(),
    )
    .await;

    let page1 = format!("{base}/page1");
    let page2 = format!("{base}/page2");
    let mut crawler = Crawler::new(Some(page1.as_str()), HeadingParser, fetcher(dir.path()));
    let error = crawler.run().await.unwrap_err();

    assert!(matches!(error, CrawlError::Parse { .. }));
    assert_eq!(error.url(), Some(page2.as_str()));

    // The cursor points at the failing page; earlier pages stay cached
    assert_eq!(crawler.cursor().link(), Some(page2.as_str()));
    assert_eq!(cache_files(dir.path()), 1);
}

struct ListParser;

impl PageParser for ListParser {
    type Output = Vec<String>;

    fn parse(&self, _document: &Document) -> Result<Vec<String>, BoxError> {
        Ok(vec!["not".to_string(), "an object".to_string()])
    }
}

impl PaginatedParser for ListParser {
    fn next_link(&self, _document: &Document, _current: &str) -> Result<Option<String>, BoxError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_non_object_data_is_a_parse_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/page1", page("H1", None)).await;

    let page1 = format!("{}/page1", server.uri());
    let mut crawler = Crawler::new(Some(page1.as_str()), ListParser, fetcher(dir.path()));

    assert!(matches!(
        crawler.run().await,
        Err(CrawlError::Parse { .. })
    ));
    assert_eq!(cache_files(dir.path()), 0);
}
