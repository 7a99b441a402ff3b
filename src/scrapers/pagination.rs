use crate::areas::Area;
use crate::models::{RawListing, SoldProperty};
use crate::scrapers::client::AreaFetchClient;
use crate::scrapers::onthehouse::{search_url, SearchQuery};
use crate::scrapers::pacing::Pacer;
use crate::scrapers::parser::ListingParser;
use crate::scrapers::traits::{ExtractionStrategy, Renderer};
use crate::storage::AreaStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Raw listings for one result page, plus whether a further page exists
#[derive(Debug, Default)]
pub struct SourcePage {
    pub listings: Vec<RawListing>,
    pub has_next: bool,
}

/// Where result pages come from. Page indices start at 1.
#[async_trait]
pub trait ListingSource: Send {
    async fn fetch_page(&mut self, area: &Area, page: u32) -> Result<SourcePage>;
}

/// Renders each search URL and reads the result cards from the live document
pub struct RenderedSearch {
    renderer: Arc<dyn Renderer>,
    strategy: Arc<dyn ExtractionStrategy>,
    settle: Duration,
    card_timeout: Duration,
}

impl RenderedSearch {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        strategy: Arc<dyn ExtractionStrategy>,
        settle: Duration,
        card_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            strategy,
            settle,
            card_timeout,
        }
    }
}

#[async_trait]
impl ListingSource for RenderedSearch {
    async fn fetch_page(&mut self, area: &Area, page: u32) -> Result<SourcePage> {
        let url = search_url(area, page);
        info!("Fetching page {}: {}", page, url);

        self.renderer.goto(&url).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        if let Err(e) = self
            .renderer
            .wait_for(self.strategy.card_selector(), self.card_timeout)
            .await
        {
            warn!("Could not find property cards: {:#}", e);
        }

        let html = self.renderer.content().await?;
        let document = Html::parse_document(&html);
        Ok(SourcePage {
            listings: self.strategy.listings(&document),
            has_next: self.strategy.has_next_page(&document),
        })
    }
}

/// Pages through the search API via an `AreaFetchClient`
pub struct ApiSearch {
    client: AreaFetchClient,
    state: String,
    page_size: u32,
}

impl ApiSearch {
    pub fn new(client: AreaFetchClient, state: &str, page_size: u32) -> Self {
        Self {
            client,
            state: state.to_string(),
            page_size,
        }
    }
}

#[async_trait]
impl ListingSource for ApiSearch {
    async fn fetch_page(&mut self, area: &Area, page: u32) -> Result<SourcePage> {
        let query = SearchQuery::for_area(area, &self.state, page.saturating_sub(1), self.page_size);
        info!("Fetching page {} via search API", page);

        let result = self.client.fetch(&query).await?;
        info!(
            "  API page {}/{} ({} results in area, {:?} transport)",
            result.page_number + 1,
            result.total_pages,
            result.total_elements,
            self.client.state()
        );
        debug!("  {} entries, page size {}", result.content.len(), result.page_size);
        Ok(SourcePage {
            listings: result.listings(),
            has_next: u64::from(page) < result.total_pages,
        })
    }
}

/// Why a crawl stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A later page produced no matching listings
    NoResults,
    /// No next-page affordance on the last page fetched
    NoNextPage,
    PageLimit,
    /// A fetch failed; listings gathered so far are kept
    FetchError(String),
}

/// Listings gathered for one area, in first-seen order
#[derive(Debug)]
pub struct CrawlOutcome {
    pub properties: Vec<SoldProperty>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Drives page-by-page traversal for one area and dedups across pages by URL.
pub struct PaginationDriver {
    parser: ListingParser,
    pacer: Pacer,
    checkpoint: Option<AreaStore>,
    today: Option<NaiveDate>,
}

impl PaginationDriver {
    pub fn new(parser: ListingParser, pacer: Pacer) -> Self {
        Self {
            parser,
            pacer,
            checkpoint: None,
            today: None,
        }
    }

    /// Append each page's new listings to the area file as they arrive
    pub fn with_checkpoint(mut self, store: AreaStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Pin the date the recency window is measured from
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub async fn crawl<S>(&self, source: &mut S, area: &Area, max_pages: u32) -> CrawlOutcome
    where
        S: ListingSource + ?Sized,
    {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let mut properties: Vec<SoldProperty> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = 1;
        let mut pages_fetched = 0;

        let stop = loop {
            if page > max_pages {
                break StopReason::PageLimit;
            }
            if page > 1 {
                self.pacer.pause(1.0).await;
            }

            let fetched = match source.fetch_page(area, page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    error!("Error fetching page {}: {:#}", page, e);
                    break StopReason::FetchError(format!("{:#}", e));
                }
            };
            pages_fetched += 1;

            let parsed = self.parser.parse(fetched.listings, area, today);
            info!(
                "  Extracted {} unique listings (from {} total)",
                parsed.unique, parsed.extracted
            );

            if parsed.properties.is_empty() {
                info!("  No matching listings found on page {}", page);
                if page > 1 {
                    break StopReason::NoResults;
                }
            } else {
                let fresh: Vec<SoldProperty> = parsed
                    .properties
                    .into_iter()
                    .filter(|p| p.has_url() && seen.insert(p.listing_url.clone()))
                    .collect();
                info!("  Found {} new matching listings", fresh.len());
                self.checkpoint_page(area, &fresh).await;
                properties.extend(fresh);
            }

            if !fetched.has_next {
                break StopReason::NoNextPage;
            }
            page += 1;
        };

        CrawlOutcome {
            properties,
            pages_fetched,
            stop,
        }
    }

    async fn checkpoint_page(&self, area: &Area, fresh: &[SoldProperty]) {
        let Some(store) = self.checkpoint.clone() else {
            return;
        };
        if fresh.is_empty() {
            return;
        }
        // the file lock may block on another process
        let key = area.key.clone();
        let records = fresh.to_vec();
        match tokio::task::spawn_blocking(move || store.append(&key, &records)).await {
            Ok(Ok(added)) => info!("  Checkpointed {} listings", added),
            Ok(Err(e)) => warn!("Checkpoint for {} failed: {:#}", area.key, e),
            Err(e) => warn!("Checkpoint task for {} panicked: {}", area.key, e),
        }
    }
}
