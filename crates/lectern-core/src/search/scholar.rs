//! Client for the academic-search provider.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{check_response, ApiError};
use crate::models::Paper;

/// Base URL for the academic-search provider when no override is configured.
pub const DEFAULT_SCHOLAR_BASE_URL: &str = "https://api.semanticscholar.org";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Fields requested per paper. The provider returns nothing beyond what is
/// asked for here.
const PAPER_FIELDS: &str = "title,abstract,year,authors,externalIds,publicationDate";

#[derive(Debug, Deserialize)]
struct PaperSearchResponse {
    #[serde(default)]
    data: Vec<PaperRecord>,
}

#[derive(Debug, Deserialize)]
struct PaperRecord {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    #[serde(default)]
    authors: Vec<AuthorRecord>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct AuthorRecord {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl PaperRecord {
    fn into_paper(self) -> Paper {
        Paper {
            paper_id: self.paper_id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            abstract_text: self.abstract_text,
            year: self.year,
            publication_date: self.publication_date,
            authors: self
                .authors
                .into_iter()
                .filter_map(|author| author.name)
                .collect(),
            doi: self.external_ids.and_then(|ids| ids.doi),
        }
    }
}

/// Client for the academic-search provider.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ScholarClient {
    /// Create a client against the given base URL. The provider serves
    /// unauthenticated requests at a lower rate limit, so the key is
    /// optional.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Search for papers matching `query`, returning up to `limit` results.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ApiError> {
        let url = format!("{}/graph/v1/paper/search", self.base_url);
        let limit = limit.to_string();

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.get(&url).query(&[
                ("query", query),
                ("limit", limit.as_str()),
                ("fields", PAPER_FIELDS),
            ]);
            if let Some(ref key) = self.api_key {
                request = request.header("x-api-key", key);
            }

            let response = request.send().await?;

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(query, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let response = check_response(response).await?;
            let parsed: PaperSearchResponse = response.json().await?;
            debug!(query, papers = parsed.data.len(), "paper search completed");

            return Ok(parsed
                .data
                .into_iter()
                .map(PaperRecord::into_paper)
                .collect());
        }
    }
}
