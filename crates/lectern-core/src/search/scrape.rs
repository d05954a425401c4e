//! Client for the web-scraping search provider.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{check_response, ApiError};
use crate::models::{ScrapeDocument, WebHit};

/// Base URL for the scraping provider when no override is configured.
pub const DEFAULT_SCRAPE_BASE_URL: &str = "https://api.firecrawl.dev";

/// HTTP request timeout in seconds.
/// Scrape requests render the target page server-side and can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum concurrent scrape requests when no limit is given.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<WebHit>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    data: ScrapePayload,
}

#[derive(Debug, Deserialize)]
struct ScrapePayload {
    #[serde(default)]
    markdown: Option<String>,
}

/// Client for the web-scraping provider.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WebSearchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Run a web search, returning up to `limit` hits.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, ApiError> {
        let url = format!("{}/v1/search", self.base_url);
        let body = serde_json::json!({ "query": query, "limit": limit });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = check_response(response).await?;
        let parsed: SearchResponse = response.json().await?;
        debug!(query, hits = parsed.data.len(), "web search completed");
        Ok(parsed.data)
    }

    /// Fetch a single page as markdown.
    pub async fn scrape(&self, url: &str) -> Result<ScrapeDocument, ApiError> {
        let endpoint = format!("{}/v1/scrape", self.base_url);
        let body = serde_json::json!({ "url": url, "formats": ["markdown"] });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = check_response(response).await?;
        let parsed: ScrapeResponse = response.json().await?;

        Ok(ScrapeDocument {
            url: url.to_string(),
            markdown: parsed.data.markdown.unwrap_or_default(),
        })
    }

    /// Scrape several URLs with at most `max_concurrency` requests in flight.
    ///
    /// Individual failures are logged and dropped from the result rather
    /// than failing the whole batch.
    pub async fn scrape_many(
        &self,
        urls: &[String],
        max_concurrency: usize,
    ) -> Vec<ScrapeDocument> {
        let limit = max_concurrency.max(1);
        stream::iter(urls.iter().cloned())
            .map(|url| async move {
                match self.scrape(&url).await {
                    Ok(document) => Some(document),
                    Err(err) => {
                        warn!(url = %url, error = %err, "scrape failed");
                        None
                    }
                }
            })
            .buffer_unordered(limit)
            .filter_map(|document| async move { document })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let json = r#"{"success":true,"data":[
            {"url":"https://example.org/paper","title":"Example","description":"A page"},
            {"url":"https://example.org/other"}
        ]}"#;

        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].title, "Example");
        // Absent fields default to empty rather than failing the parse.
        assert_eq!(parsed.data[1].title, "");
        assert_eq!(parsed.data[1].url, "https://example.org/other");
    }

    #[test]
    fn test_parse_scrape_response() {
        let json = r##"{"success":true,"data":{"markdown":"# Heading","metadata":{"statusCode":200}}}"##;
        let parsed: ScrapeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.markdown.as_deref(), Some("# Heading"));

        let json = r#"{"data":{}}"#;
        let parsed: ScrapeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.markdown, None);
    }
}
