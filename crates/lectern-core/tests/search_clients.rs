//! Search-provider clients against stubbed endpoints.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lectern_core::search::{ScholarClient, WebSearchClient};

#[tokio::test]
async fn web_search_sends_key_and_parses_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [
                { "url": "https://example.org/a", "title": "A", "description": "first" },
                { "url": "https://example.org/b", "title": "B", "description": "second" },
            ],
        })))
        .mount(&server)
        .await;

    let client = WebSearchClient::new(server.uri(), "test-key").unwrap();
    let hits = client.search("transformer models", 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://example.org/a");
    assert_eq!(hits[1].description, "second");
}

#[tokio::test]
async fn scrape_many_drops_failures_and_keeps_successes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "markdown": "# Page" },
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(500).set_body_string("render failed"))
        .mount(&server)
        .await;

    let client = WebSearchClient::new(server.uri(), "test-key").unwrap();
    let urls = vec![
        "https://example.org/a".to_string(),
        "https://example.org/b".to_string(),
        "https://example.org/c".to_string(),
    ];
    // Sequential so the failing response lands on a deterministic request.
    let documents = client.scrape_many(&urls, 1).await;
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| d.markdown == "# Page"));
}

#[tokio::test]
async fn scholar_search_parses_papers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .and(query_param("query", "attention"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 1,
            "data": [{
                "paperId": "649def34",
                "title": "Attention Is All You Need",
                "abstract": "The dominant sequence transduction models...",
                "year": 2017,
                "authors": [{ "name": "Ashish Vaswani" }],
                "externalIds": { "DOI": "10.5555/3295222.3295349" },
            }],
        })))
        .mount(&server)
        .await;

    let client = ScholarClient::new(server.uri(), None).unwrap();
    let papers = client.search("attention", 3).await.unwrap();
    assert_eq!(papers.len(), 1);
    assert_eq!(papers[0].title, "Attention Is All You Need");
    assert_eq!(papers[0].year, Some(2017));
    assert_eq!(papers[0].doi.as_deref(), Some("10.5555/3295222.3295349"));
}

#[tokio::test]
async fn scholar_search_retries_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 0,
            "data": [],
        })))
        .mount(&server)
        .await;

    let client = ScholarClient::new(server.uri(), None).unwrap();
    let papers = client.search("attention", 3).await.unwrap();
    assert!(papers.is_empty());
}
