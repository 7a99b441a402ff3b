use crate::models::{PropertyDetails, RawListing};
use crate::scrapers::client::FetchError;
use crate::scrapers::onthehouse::{SearchPage, SearchQuery};
use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Plain network transport for search requests
#[async_trait]
pub trait DirectFetcher: Send + Sync {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchPage, FetchError>;
}

/// A live, rendered browser session
///
/// One session belongs to one area crawl at a time.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigate and return once the document has loaded
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Wait until an element matching `selector` is present
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Serialized HTML of the live document
    async fn content(&self) -> Result<String>;

    /// POST a JSON payload from inside the page, inheriting the session's cookies
    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value>;
}

/// Opens a fresh rendered session for one area
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn Renderer>>;
}

/// Site markup rules, kept behind one interface so markup changes stay local
pub trait ExtractionStrategy: Send + Sync {
    /// Selector whose presence means result cards have rendered
    fn card_selector(&self) -> &str;

    /// Raw listing bags for every result card. Malformed cards are skipped.
    fn listings(&self, document: &Html) -> Vec<RawListing>;

    /// Whether the page offers a link to the next result page
    fn has_next_page(&self, document: &Html) -> bool;

    /// Attributes from a listing's own page
    fn details(&self, document: &Html) -> PropertyDetails;
}
