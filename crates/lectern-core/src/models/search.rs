//! Result types for the external search providers.

use serde::Deserialize;

/// A single result from the web-search provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Scraped page content, rendered as markdown by the provider.
#[derive(Debug, Clone)]
pub struct ScrapeDocument {
    pub url: String,
    pub markdown: String,
}

/// A paper returned by the academic-search provider.
#[derive(Debug, Clone)]
pub struct Paper {
    pub paper_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub publication_date: Option<String>,
    pub authors: Vec<String>,
    pub doi: Option<String>,
}

impl Paper {
    /// Comma-separated author list for display.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}
