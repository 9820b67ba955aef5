//! Integration tests for the retrying HTTP client

use crate::common::client;
use pagetrail::CrawlError;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_retries_retryable_status_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(3)
        .get(&format!("{}/unstable", server.uri()), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert!(response.is_ok());
    assert_eq!(response.body, "finally");
}

#[tokio::test]
async fn test_retry_budget_exhausted_returns_last_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let response = client(2).get(&server.uri(), TIMEOUT).await.unwrap();

    assert_eq!(response.status_code, 503);
    assert_eq!(response.reason, "Service Unavailable");
    assert!(!response.is_ok());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(5).get(&server.uri(), TIMEOUT).await.unwrap();
    assert_eq!(response.status_code, 404);
    assert!(!response.is_ok());
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "pagetrail-test/1.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(0).get(&server.uri(), TIMEOUT).await.unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_headers_and_final_url() {
    let server = MockServer::start().await;
    let location = format!("{}/new", server.uri());
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", location.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=ISO-8859-1")
                .insert_header("x-trace", "abc"),
        )
        .mount(&server)
        .await;

    let response = client(0)
        .get(&format!("{}/old", server.uri()), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(response.url.path(), "/new");
    assert_eq!(response.encoding.as_deref(), Some("ISO-8859-1"));
    assert_eq!(response.headers.get("x-trace").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn test_transport_error_after_retries() {
    let error = client(2)
        .get("http://127.0.0.1:9/unreachable", TIMEOUT)
        .await
        .unwrap_err();

    match error {
        CrawlError::Transport { url, attempts, .. } => {
            assert_eq!(url, "http://127.0.0.1:9/unreachable");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_url_is_not_retried() {
    let error = client(5).get("not a url", TIMEOUT).await.unwrap_err();
    assert!(matches!(error, CrawlError::Transport { attempts: 1, .. }));
}
