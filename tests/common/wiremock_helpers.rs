use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use std::time::Duration;

/// Creates a mock search engine that serves `html` as the result page at `url_path`.
///
/// Every query gets the same page.
pub async fn mock_search_page(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Mounts a result page for one exact query string (the decoded `q` parameter).
pub async fn mount_query_page(server: &MockServer, url_path: &str, query: &str, status: u16, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .and(query_param("q", query))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Creates a mock SearxNG-style JSON search service answering at `/search`.
pub async fn mock_wrapper_server(results: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": results })))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
///
/// The server will wait for `delay_ms` milliseconds before responding with a 200 OK.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("delayed response")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_search_page_serves_html() {
        let html = "<html><body><div class=\"yuRUbf\"></div></body></html>";
        let server = mock_search_page("/search", html).await;

        let response = reqwest::get(format!("{}/search?q=teste", server.uri())).await.unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("yuRUbf"));
    }

    #[tokio::test]
    async fn test_mock_error_server_returns_status_code() {
        let server = mock_error_server(503).await;

        let response = reqwest::get(format!("{}/any-path", server.uri())).await.unwrap();

        assert_eq!(response.status(), 503);
    }
}
