//! Integration tests for the parallel link scraper

use crate::common::{cache_files, fetcher, mount_page, page, request_count, HeadingParser};
use pagetrail::config::{Backend, Jobs};
use pagetrail::crawler::LinkScraper;
use pagetrail::CrawlError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LINKS: usize = 6;

async fn serve_links(server: &MockServer) -> Vec<String> {
    let mut links = Vec::with_capacity(LINKS);
    for i in 0..LINKS {
        let route = format!("/item/{i}");
        mount_page(server, &route, page(&format!("Item {i}"), None)).await;
        links.push(format!("{}{route}", server.uri()));
    }
    links
}

#[tokio::test]
async fn test_fan_out_completeness() {
    for backend in [Backend::Tasks, Backend::Threads] {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let links = serve_links(&server).await;

        let scraper = LinkScraper::new(
            links.clone(),
            None,
            HeadingParser,
            fetcher(dir.path()).with_cache_enabled(false),
        )
        .with_backend(backend)
        .with_jobs(Jobs::Fixed(3));
        let summary = scraper.run().await.unwrap();

        assert_eq!(summary.total, LINKS);
        assert_eq!(summary.fetched, LINKS);
        assert_eq!(request_count(&server).await, LINKS);
        assert_eq!(cache_files(dir.path()), LINKS);

        let rerun = LinkScraper::new(links, None, HeadingParser, fetcher(dir.path()))
            .with_backend(backend);
        let summary = rerun.run().await.unwrap();

        assert_eq!(summary.restored, LINKS);
        assert_eq!(summary.fetched, 0);
        assert_eq!(request_count(&server).await, LINKS, "{backend:?} refetched");
    }
}

#[tokio::test]
async fn test_records_hold_parsed_data() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let links = serve_links(&server).await;

    let fetcher = fetcher(dir.path());
    let cache = fetcher.cache().clone();
    LinkScraper::new(links.clone(), Some(2), HeadingParser, fetcher)
        .run()
        .await
        .unwrap();

    assert_eq!(cache_files(dir.path()), 2);
    let record = cache.restore(&links[1]).unwrap().unwrap();
    assert_eq!(record.data()["heading"], "Item 1");
    assert!(!cache.contains(&links[2]));
}

#[tokio::test]
async fn test_failures_are_collected_after_the_pool_drains() {
    for backend in [Backend::Tasks, Backend::Threads] {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let mut links = serve_links(&server).await;

        let broken = format!("{}/broken", server.uri());
        mount_page(&server, "/broken", "<html><body>nothing</body></html>".to_string()).await;
        Mock::given(method("GET"))
            .and(path("/unavailable"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let unavailable = format!("{}/unavailable", server.uri());
        links.insert(1, broken.clone());
        links.push(unavailable.clone());

        let fetcher = fetcher(dir.path());
        let cache = fetcher.cache().clone();
        let scraper = LinkScraper::new(links, None, HeadingParser, fetcher).with_backend(backend);

        let (failures, summary) = match scraper.run().await {
            Err(CrawlError::LinksFailed { failures, summary }) => (failures, summary),
            other => panic!("expected LinksFailed, got {other:?}"),
        };

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].url, broken);
        assert!(matches!(failures[0].error, CrawlError::Parse { .. }));

        assert_eq!(summary.total, LINKS + 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_ok, 1);
        assert_eq!(summary.fetched, LINKS + 1);

        // Successes and the non-ok response are cached, the parse failure is not
        assert_eq!(cache_files(dir.path()), LINKS + 1);
        assert!(!cache.contains(&broken));
        assert!(cache.contains(&unavailable));
        assert!(cache.restore(&unavailable).unwrap().is_none());
    }
}

#[tokio::test]
async fn test_transport_errors_are_isolated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut links = serve_links(&server).await;
    links.push("http://127.0.0.1:9/closed".to_string());

    let error = LinkScraper::new(links, None, HeadingParser, fetcher(dir.path()))
        .with_jobs(Jobs::All)
        .run()
        .await
        .unwrap_err();

    match error {
        CrawlError::LinksFailed { failures, summary } => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0].error, CrawlError::Transport { .. }));
            assert_eq!(summary.fetched, LINKS);
        }
        other => panic!("expected LinksFailed, got {other:?}"),
    }
    assert_eq!(cache_files(dir.path()), LINKS);
}
