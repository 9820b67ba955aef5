//! Integration tests for the cache-or-fetch protocol

use crate::common::{cache_files, fetcher, mount_page, page, request_count, HeadingParser};
use pagetrail::cache::{restore, store};
use pagetrail::{hash_key, CrawlError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_cached_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/page", page("Cached", None)).await;

    let url = format!("{}/page", server.uri());
    let fetcher = fetcher(dir.path());

    let first = fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();
    let stored = std::fs::read(fetcher.cache().entry_path(&url)).unwrap();

    for _ in 0..3 {
        let again = fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();
        assert_eq!(again, first);
    }

    assert_eq!(request_count(&server).await, 1);
    assert_eq!(std::fs::read(fetcher.cache().entry_path(&url)).unwrap(), stored);
    assert_eq!(first.data()["heading"], "Cached");
    assert_eq!(first.encoding_name(), Some("utf-8"));
}

#[tokio::test]
async fn test_disabled_cache_always_fetches_and_stores() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/page", page("Fresh", None)).await;

    let url = format!("{}/page", server.uri());
    let fetcher = fetcher(dir.path()).with_cache_enabled(false);

    fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();
    fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();

    assert_eq!(request_count(&server).await, 2);
    assert_eq!(cache_files(dir.path()), 1);
}

#[tokio::test]
async fn test_failed_fetch_overwrites_cached_success() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("Good", None)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let cached = fetcher(dir.path());
    let good = cached.fetch_cached(&url, &HeadingParser).await.unwrap();
    assert!(good.ok());
    assert!(cached.cache().restore(&url).unwrap().is_some());

    // Without cache lookups the 404 is fetched and replaces the good entry
    let uncached = fetcher(dir.path()).with_cache_enabled(false);
    let bad = uncached.fetch_cached(&url, &HeadingParser).await.unwrap();
    assert!(!bad.ok());
    assert_eq!(bad.status_code(), 404);
    assert!(bad.data().as_object().unwrap().is_empty());

    assert!(cached.cache().restore(&url).unwrap().is_none());
    assert_eq!(cache_files(dir.path()), 1);

    // Caching on again: the miss forces another fetch
    cached.fetch_cached(&url, &HeadingParser).await.unwrap();
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_cache_miss_on_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/down", server.uri());
    let fetcher = fetcher(dir.path());
    let record = fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();

    assert!(!record.ok());
    assert_eq!(restore(dir.path(), &url).unwrap(), None);

    fetcher.fetch_cached(&url, &HeadingParser).await.unwrap();
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_malformed_cache_entry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/page", page("Never", None)).await;

    let url = format!("{}/page", server.uri());
    let fetcher = fetcher(dir.path());
    std::fs::write(fetcher.cache().entry_path(&url), "[1, 2, 3]").unwrap();

    assert!(matches!(
        restore(dir.path(), &url),
        Err(CrawlError::MalformedCache { .. })
    ));
    assert!(matches!(
        fetcher.fetch_cached(&url, &HeadingParser).await,
        Err(CrawlError::MalformedCache { .. })
    ));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_store_then_restore_through_free_functions() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_page(&server, "/page", page("Stored", None)).await;

    let url = format!("{}/page", server.uri());
    let record = fetcher(dir.path())
        .fetch_and_parse(&url, &HeadingParser)
        .await
        .unwrap();
    assert_eq!(cache_files(dir.path()), 0);

    store(dir.path(), &url, &record).unwrap();
    assert!(dir
        .path()
        .join(format!("chunk_{}.json", hash_key(&url)))
        .is_file());
    assert_eq!(restore(dir.path(), &url).unwrap(), Some(record));
}

#[test]
fn test_hash_determinism() {
    let u1 = "https://example.com/page1";
    let u2 = "https://example.com/page2";

    assert_eq!(hash_key(u1), hash_key(u1));
    assert_ne!(hash_key(u1), hash_key(u2));
    assert!(hash_key(u1)
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
