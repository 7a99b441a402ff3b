use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which transport drives search-page traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Render each search URL in the browser and read the result cards
    Rendered,
    /// Call the search API directly, falling back to the browser session
    Api,
}

/// Business filters applied to every extracted listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingFilter {
    /// Minimum bedrooms, inclusive (unknown bedroom counts always pass)
    pub min_bedrooms: u32,
    /// Maximum bedrooms, inclusive
    pub max_bedrooms: u32,
    /// Required property type, compared case-insensitively
    pub property_type: String,
    /// Sale must fall within this many days of today (unparseable dates pass)
    pub recency_days: i64,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            min_bedrooms: 3,
            max_bedrooms: 4,
            property_type: "house".to_string(),
            recency_days: 90,
        }
    }
}

/// Runtime settings for one scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    pub filter: ListingFilter,
    /// Maximum result pages per area
    pub max_pages: u32,
    /// Results per API page
    pub page_size: u32,
    /// State code sent to the search API
    pub state: String,
    /// Lower bound of the randomized delay between page fetches
    pub min_delay: Duration,
    /// Upper bound of the randomized delay between page fetches
    pub max_delay: Duration,
    /// Scale applied to the page delay between detail-page visits
    pub detail_delay_factor: f64,
    /// Scale applied to the page delay between areas
    pub area_delay_factor: f64,
    /// Visit each listing's own page to fill missing attributes
    pub fetch_details: bool,
    pub headless: bool,
    pub mode: TransportMode,
    /// Pause after a search page navigation before reading it
    pub page_settle: Duration,
    /// Pause after a detail page navigation before reading it
    pub detail_settle: Duration,
    /// Pause after the fallback session navigates onto the site
    pub session_settle: Duration,
    /// How long to wait for result cards to appear
    pub card_timeout: Duration,
    /// Timeout for direct API requests
    pub http_timeout: Duration,
    /// Append each page's new listings to the area file as they arrive
    pub checkpoint: bool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            filter: ListingFilter::default(),
            max_pages: 5,
            page_size: 24,
            state: "QLD".to_string(),
            min_delay: Duration::from_millis(1500),
            max_delay: Duration::from_millis(3000),
            detail_delay_factor: 0.5,
            area_delay_factor: 1.5,
            fetch_details: true,
            headless: true,
            mode: TransportMode::Rendered,
            page_settle: Duration::from_secs(3),
            detail_settle: Duration::from_secs(2),
            session_settle: Duration::from_secs(1),
            card_timeout: Duration::from_secs(15),
            http_timeout: Duration::from_secs(30),
            checkpoint: false,
        }
    }
}

impl ScrapeSettings {
    /// Settings with every pause and delay zeroed
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            page_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            session_settle: Duration::ZERO,
            card_timeout: Duration::ZERO,
            ..Self::default()
        }
    }
}
