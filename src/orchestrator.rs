use crate::areas::{Area, AreaTable};
use crate::models::SoldProperty;
use crate::scrapers::client::AreaFetchClient;
use crate::scrapers::details::{DetailEnricher, EnrichStats};
use crate::scrapers::markup::OnTheHouseMarkup;
use crate::scrapers::pacing::Pacer;
use crate::scrapers::pagination::{
    ApiSearch, CrawlOutcome, PaginationDriver, RenderedSearch, StopReason,
};
use crate::scrapers::parser::ListingParser;
use crate::scrapers::traits::{DirectFetcher, ExtractionStrategy, Renderer, SessionFactory};
use crate::scrapers::types::{ScrapeSettings, TransportMode};
use crate::storage::AreaStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info};

/// What happened to one area
#[derive(Debug)]
pub struct AreaReport {
    pub area: Area,
    pub properties: Vec<SoldProperty>,
    pub pages_fetched: u32,
    pub stop: StopReason,
    pub details: Option<EnrichStats>,
}

impl AreaReport {
    /// Nothing could be fetched at all
    pub fn failed(&self) -> bool {
        self.pages_fetched == 0 && matches!(self.stop, StopReason::FetchError(_))
    }
}

/// min / max / mean over the records that have a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueStats {
    pub count: usize,
    pub min: i64,
    pub max: i64,
    pub avg: i64,
}

impl ValueStats {
    pub fn from_values(values: &[i64]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let sum: i128 = values.iter().map(|v| i128::from(*v)).sum();
        let avg = (sum / values.len() as i128) as i64;
        Some(Self {
            count: values.len(),
            min,
            max,
            avg,
        })
    }
}

/// Aggregate counts for a run over one or more areas
#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub per_area: Vec<(String, usize)>,
    pub total_properties: usize,
    prices: Vec<i64>,
    land_sizes: Vec<i64>,
}

impl RunSummary {
    pub fn record(&mut self, report: &AreaReport) {
        self.attempted += 1;
        if report.failed() {
            self.failed.push(report.area.key.clone());
        } else {
            self.succeeded += 1;
        }
        self.per_area
            .push((report.area.display_name(), report.properties.len()));
        self.total_properties += report.properties.len();
        // zero means undisclosed, not free
        self.prices
            .extend(report.properties.iter().filter_map(|p| p.sale_price).filter(|v| *v > 0));
        self.land_sizes
            .extend(report.properties.iter().filter_map(|p| p.land_size_sqm).filter(|v| *v > 0));
    }

    pub fn record_failure(&mut self, area: &Area) {
        self.attempted += 1;
        self.failed.push(area.key.clone());
        self.per_area.push((area.display_name(), 0));
    }

    pub fn price_stats(&self) -> Option<ValueStats> {
        ValueStats::from_values(&self.prices)
    }

    pub fn land_stats(&self) -> Option<ValueStats> {
        ValueStats::from_values(&self.land_sizes)
    }
}

/// Sequences areas through crawl, enrichment and persistence
pub struct Orchestrator {
    areas: AreaTable,
    settings: ScrapeSettings,
    store: AreaStore,
    sessions: Arc<dyn SessionFactory>,
    direct: Option<Arc<dyn DirectFetcher>>,
    strategy: Arc<dyn ExtractionStrategy>,
    today: Option<NaiveDate>,
}

impl Orchestrator {
    pub fn new(
        areas: AreaTable,
        settings: ScrapeSettings,
        store: AreaStore,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            areas,
            settings,
            store,
            sessions,
            direct: None,
            strategy: Arc::new(OnTheHouseMarkup::new()),
            today: None,
        }
    }

    /// Direct transport used in API mode
    pub fn with_direct(mut self, direct: Arc<dyn DirectFetcher>) -> Self {
        self.direct = Some(direct);
        self
    }

    #[cfg(test)]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn areas(&self) -> &AreaTable {
        &self.areas
    }

    pub fn store(&self) -> &AreaStore {
        &self.store
    }

    fn pacer(&self) -> Pacer {
        Pacer::new(self.settings.min_delay, self.settings.max_delay)
    }

    fn driver(&self) -> PaginationDriver {
        let mut driver = PaginationDriver::new(
            ListingParser::new(self.settings.filter.clone()),
            self.pacer(),
        );
        if self.settings.checkpoint {
            driver = driver.with_checkpoint(self.store.clone());
        }
        if let Some(today) = self.today {
            driver = driver.with_today(today);
        }
        driver
    }

    async fn crawl(&self, session: &Arc<dyn Renderer>, area: &Area) -> Result<CrawlOutcome> {
        let driver = self.driver();
        let max_pages = self.settings.max_pages;

        let outcome = match self.settings.mode {
            TransportMode::Rendered => {
                let mut source = RenderedSearch::new(
                    Arc::clone(session),
                    Arc::clone(&self.strategy),
                    self.settings.page_settle,
                    self.settings.card_timeout,
                );
                driver.crawl(&mut source, area, max_pages).await
            }
            TransportMode::Api => {
                let direct = self
                    .direct
                    .clone()
                    .context("API mode needs a direct fetcher")?;
                let client = AreaFetchClient::new(direct)
                    .with_fallback(Arc::clone(session))
                    .with_session_settle(self.settings.session_settle);
                let mut source =
                    ApiSearch::new(client, &self.settings.state, self.settings.page_size);
                driver.crawl(&mut source, area, max_pages).await
            }
        };
        Ok(outcome)
    }

    /// Crawl one area, enrich it, and save whatever was collected.
    pub async fn scrape_area(&self, area: &Area) -> Result<AreaReport> {
        let session = self
            .sessions
            .open()
            .await
            .with_context(|| format!("Failed to open browser session for {}", area.key))?;

        let outcome = self.crawl(&session, area).await?;
        let mut properties = outcome.properties;

        let details = if self.settings.fetch_details && !properties.is_empty() {
            let enricher = DetailEnricher::new(
                Arc::clone(&session),
                Arc::clone(&self.strategy),
                self.pacer(),
                self.settings.detail_delay_factor,
                self.settings.detail_settle,
            );
            Some(enricher.enrich_all(&mut properties).await)
        } else {
            None
        };
        drop(session);

        if !properties.is_empty() {
            let store = self.store.clone();
            let key = area.key.clone();
            properties = tokio::task::spawn_blocking(move || {
                store.save(&key, &properties).map(|()| properties)
            })
            .await
            .context("Save task panicked")??;
        }

        Ok(AreaReport {
            area: area.clone(),
            properties,
            pages_fetched: outcome.pages_fetched,
            stop: outcome.stop,
            details,
        })
    }

    /// Scrape areas in order; a failing area is logged and skipped.
    pub async fn scrape_areas(&self, areas: &[Area]) -> RunSummary {
        let mut summary = RunSummary::default();
        let pacer = self.pacer();

        for (i, area) in areas.iter().enumerate() {
            info!(
                "[{}/{}] {}, {} {}",
                i + 1,
                areas.len(),
                area.display_name(),
                self.settings.state,
                area.postcode
            );

            match self.scrape_area(area).await {
                Ok(report) => {
                    if let Some(details) = &report.details {
                        info!(
                            "  Details: {} visited, {} failed, {} skipped",
                            details.visited, details.failed, details.skipped
                        );
                    }
                    info!("  Completed: {} properties", report.properties.len());
                    summary.record(&report);
                }
                Err(e) => {
                    error!("  Error: {:#}", e);
                    summary.record_failure(area);
                }
            }

            if i + 1 < areas.len() {
                pacer.pause(self.settings.area_delay_factor).await;
            }
        }

        summary
    }

    pub async fn scrape_all(&self) -> RunSummary {
        let areas: Vec<Area> = self.areas.iter().collect();
        self.scrape_areas(&areas).await
    }
}
