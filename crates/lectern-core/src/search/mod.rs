//! Clients for the two external search products.
//!
//! - `WebSearchClient`: web search and page scraping behind a bearer API key
//! - `ScholarClient`: academic paper search, optional API key
//!
//! Both are stateless request/parse clients; provider responses are parsed
//! leniently so schema additions on their side don't break us.

pub mod scholar;
pub mod scrape;

pub use scholar::ScholarClient;
pub use scrape::WebSearchClient;
