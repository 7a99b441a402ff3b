use crate::models::SoldProperty;
use crate::scrapers::pacing::Pacer;
use crate::scrapers::traits::{ExtractionStrategy, Renderer};
use anyhow::Result;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Visits each listing's own page and fills in attributes the result card lacked
pub struct DetailEnricher {
    renderer: Arc<dyn Renderer>,
    strategy: Arc<dyn ExtractionStrategy>,
    pacer: Pacer,
    delay_factor: f64,
    settle: Duration,
}

/// Counts from one enrichment pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub visited: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DetailEnricher {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        strategy: Arc<dyn ExtractionStrategy>,
        pacer: Pacer,
        delay_factor: f64,
        settle: Duration,
    ) -> Self {
        Self {
            renderer,
            strategy,
            pacer,
            delay_factor,
            settle,
        }
    }

    /// Fill missing fields of one record from its listing page.
    /// Fields that already hold a value are left untouched.
    pub async fn enrich(&self, property: &mut SoldProperty) -> Result<()> {
        if !property.has_url() {
            return Ok(());
        }

        self.renderer.goto(&property.listing_url).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        let html = self.renderer.content().await?;
        let details = {
            let document = Html::parse_document(&html);
            self.strategy.details(&document)
        };
        property.fill_from(&details);
        Ok(())
    }

    /// Enrich every record in turn. A failure on one record is logged and the
    /// pass moves on.
    pub async fn enrich_all(&self, properties: &mut [SoldProperty]) -> EnrichStats {
        let mut stats = EnrichStats::default();
        let total = properties.len();
        info!("  Fetching details for {} properties...", total);

        for (i, property) in properties.iter_mut().enumerate() {
            if !property.has_url() {
                stats.skipped += 1;
                continue;
            }
            info!("    [{}/{}] {}", i + 1, total, property.address);

            stats.visited += 1;
            if let Err(e) = self.enrich(property).await {
                stats.failed += 1;
                warn!("  Error fetching details for {}: {:#}", property.address, e);
            }
            self.pacer.pause(self.delay_factor).await;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::markup::OnTheHouseMarkup;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct DetailPages {
        current: Mutex<String>,
        visits: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Renderer for DetailPages {
        async fn goto(&self, url: &str) -> Result<()> {
            if url.ends_with("/broken") {
                return Err(anyhow!("net::ERR_CONNECTION_RESET"));
            }
            self.visits.lock().unwrap().push(url.to_string());
            *self.current.lock().unwrap() = url.to_string();
            Ok(())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(self.current.lock().unwrap().clone())
        }

        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            Ok(r#"<html><body>
                <p>Bedrooms: 5</p><p>Bathrooms: 2</p><p>Garage: 2</p>
                <div>Land Size: 1,012 m²</div>
                <div class="listing-description">Big block close to schools.</div>
            </body></html>"#
                .to_string())
        }

        async fn post_json(&self, _url: &str, _payload: &Value) -> Result<Value> {
            Err(anyhow!("not used"))
        }
    }

    fn enricher(renderer: Arc<DetailPages>) -> DetailEnricher {
        DetailEnricher::new(
            renderer,
            Arc::new(OnTheHouseMarkup::new()),
            Pacer::new(Duration::ZERO, Duration::ZERO),
            0.5,
            Duration::ZERO,
        )
    }

    fn renderer() -> Arc<DetailPages> {
        Arc::new(DetailPages {
            current: Mutex::new(String::new()),
            visits: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn fills_only_missing_fields() {
        let mut property = SoldProperty {
            address: "1 Test St".to_string(),
            listing_url: "https://www.onthehouse.com.au/property/1".to_string(),
            bedrooms: Some(3),
            ..Default::default()
        };

        enricher(renderer()).enrich(&mut property).await.unwrap();

        assert_eq!(property.bedrooms, Some(3));
        assert_eq!(property.bathrooms, Some(2));
        assert_eq!(property.parking, Some(2));
        assert_eq!(property.land_size_sqm, Some(1012));
        assert_eq!(property.description, "Big block close to schools.");
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let renderer = renderer();
        let mut properties = vec![
            SoldProperty {
                listing_url: "https://www.onthehouse.com.au/property/broken".to_string(),
                ..Default::default()
            },
            SoldProperty::default(),
            SoldProperty {
                listing_url: "https://www.onthehouse.com.au/property/2".to_string(),
                ..Default::default()
            },
        ];

        let stats = enricher(renderer.clone()).enrich_all(&mut properties).await;

        assert_eq!(
            stats,
            EnrichStats {
                visited: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(properties[0].land_size_sqm, None);
        assert_eq!(properties[2].land_size_sqm, Some(1012));
        assert_eq!(renderer.visits.lock().unwrap().len(), 1);
    }
}
