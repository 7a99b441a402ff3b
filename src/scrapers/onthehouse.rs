use crate::areas::Area;
use crate::models::RawListing;
use crate::scrapers::client::FetchError;
use crate::scrapers::traits::DirectFetcher;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const BASE_URL: &str = "https://www.onthehouse.com.au";
pub const API_URL: &str = "https://www.onthehouse.com.au/odin/api/composite/search";
pub const SITE_HOST: &str = "onthehouse.com.au";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Sold-listings search page for an area. Page numbers start at 1.
pub fn search_url(area: &Area, page: u32) -> String {
    let base = format!("{}/sold/qld/{}-{}", BASE_URL, area.key, area.postcode);
    if page > 1 {
        format!("{}?page={}", base, page)
    } else {
        base
    }
}

/// Make a listing href absolute against the site base.
pub fn absolute_url(href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", BASE_URL, href)
    } else {
        format!("{}/{}", BASE_URL, href)
    }
}

/// One logical search request against the composite search API
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Space-separated suburb name, e.g. "wynnum west"
    pub suburb: String,
    pub postcode: String,
    pub state: String,
    /// Zero-based page number
    pub page: u32,
    pub size: u32,
}

impl SearchQuery {
    pub fn for_area(area: &Area, state: &str, page: u32, size: u32) -> Self {
        Self {
            suburb: area.query_name(),
            postcode: area.postcode.clone(),
            state: state.to_string(),
            page,
            size,
        }
    }

    pub fn payload(&self) -> Value {
        json!({
            "size": self.size,
            "number": self.page,
            "sort": [{"lastSale.eventDate": "desc"}],
            "query": {
                "queries": [{
                    "category": "RecentlySold",
                    "stateCode": self.state,
                    "suburb": self.suburb,
                    "postCode": self.postcode,
                }]
            }
        })
    }

    /// Search page a browser would have open when issuing this request
    pub fn referer(&self) -> String {
        format!(
            "{}/sold/{}/{}-{}",
            BASE_URL,
            self.state.to_lowercase(),
            self.suburb.replace(' ', "-"),
            self.postcode
        )
    }
}

/// One page of API results plus pagination metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchPage {
    pub content: Vec<Value>,
    pub total_elements: u64,
    pub total_pages: u64,
    #[serde(rename = "number")]
    pub page_number: u64,
    #[serde(rename = "size")]
    pub page_size: u64,
}

impl SearchPage {
    pub fn from_json(value: Value) -> Result<Self, FetchError> {
        serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Map content entries to raw listings. Entries that are not objects are skipped.
    pub fn listings(&self) -> Vec<RawListing> {
        self.content
            .iter()
            .filter_map(|entry| {
                let listing = listing_from_entry(entry);
                if listing.is_none() {
                    debug!("Skipping malformed search entry");
                }
                listing
            })
            .collect()
    }
}

fn first_str(entry: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match entry.pointer(p)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_count(entry: &Value, pointers: &[&str]) -> Option<u32> {
    pointers.iter().find_map(|p| match entry.pointer(p)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Whole-dollar price as text. Numbers are truncated so "910000.0" never
/// reaches the digit-only price parser.
fn first_price(entry: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match entry.pointer(p)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(|price| price.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Reduce an API timestamp ("2023-01-05T00:00:00Z") to its calendar date.
/// Anything else is returned unchanged.
fn date_part(text: String) -> String {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(&text) {
        return stamp.date_naive().format("%Y-%m-%d").to_string();
    }
    let dated_stamp = text.len() > 10
        && text.get(10..).is_some_and(|rest| rest.starts_with('T'))
        && NaiveDate::parse_from_str(&text[..10], "%Y-%m-%d").is_ok();
    if dated_stamp {
        text[..10].to_string()
    } else {
        text
    }
}

fn listing_from_entry(entry: &Value) -> Option<RawListing> {
    if !entry.is_object() {
        return None;
    }
    let url = first_str(entry, &["/url", "/propertyUrl", "/links/property"])
        .map(|href| absolute_url(&href))
        .unwrap_or_default();
    let address = first_str(entry, &["/address/fullAddress", "/fullAddress", "/address"])
        .unwrap_or_default();
    if url.is_empty() && address.is_empty() {
        return None;
    }

    Some(RawListing {
        url,
        address,
        price: first_price(entry, &["/lastSale/price", "/lastSale/displayPrice", "/price"]),
        bedrooms: first_count(entry, &["/bedrooms", "/attributes/bedrooms", "/features/bedrooms"]),
        bathrooms: first_count(entry, &["/bathrooms", "/attributes/bathrooms", "/features/bathrooms"]),
        parking: first_count(entry, &["/carSpaces", "/parking", "/attributes/carSpaces"]),
        sold_text: first_str(entry, &["/lastSale/eventDate", "/soldDate"])
            .map(date_part)
            .unwrap_or_default(),
        property_type: first_str(entry, &["/propertyType", "/type"]),
        agent_name: first_str(entry, &["/lastSale/agent/name", "/agent/name", "/agentName"]),
        agency_name: first_str(entry, &["/lastSale/agency/name", "/agency/name", "/agencyName"]),
    })
}

/// Direct HTTP client for the composite search API
pub struct OnTheHouseApi {
    client: Client,
}

impl OnTheHouseApi {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(BASE_URL));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DirectFetcher for OnTheHouseApi {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchPage, FetchError> {
        debug!("POST {} page {}", API_URL, query.page);

        let response = self
            .client
            .post(API_URL)
            .header(REFERER, query.referer())
            .json(&query.payload())
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Search API returned status: {}", response.status());
            return Err(FetchError::Transport(format!("HTTP {}", response.status())));
        }

        let body: Value = response.json().await?;
        SearchPage::from_json(body)
    }
}
