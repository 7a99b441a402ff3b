use crate::areas::Area;
use crate::models::{RawListing, SoldProperty};
use crate::scrapers::types::ListingFilter;
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Recognised sale-date formats, tried in order
const DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%d/%m/%Y"];

fn sold_ribbon_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Sold\s+(?:on\s+)?(\d{1,2}\s+\w+\s+\d{4})").expect("valid sold ribbon regex")
    })
}

fn land_size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:,\d+)?)\s*(?:m²|m2|sqm|square\s*m)").expect("valid land size regex")
    })
}

/// "$750,000" -> 750000. "Price not available" and text without digits are unknown.
pub fn parse_price(text: Option<&str>) -> Option<i64> {
    let text = text?;
    if text.to_lowercase().contains("not available") {
        return None;
    }
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Pull the date out of ribbon text like "Sold on 23 Dec 2025".
/// Text that is already a bare date in a recognised format is returned as-is.
pub fn parse_sold_date(text: &str) -> Option<String> {
    if let Some(caps) = sold_ribbon_regex().captures(text) {
        return Some(caps[1].to_string());
    }
    let trimmed = text.trim();
    parse_date(trimmed).map(|_| trimmed.to_string())
}

/// "650 m²", "650m2", "1,200 sqm" -> square meters
pub fn parse_land_size(text: &str) -> Option<i64> {
    let caps = land_size_regex().captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Whether a sale date falls within `days` of `today`.
/// Missing or unparseable dates are kept. A window reaching past the earliest
/// representable date keeps everything.
pub fn is_within_window(date: Option<&str>, days: i64, today: NaiveDate) -> bool {
    let Some(sold) = date.and_then(parse_date) else {
        return true;
    };
    let start = Duration::try_days(days.max(0)).and_then(|span| today.checked_sub_signed(span));
    match start {
        Some(start) => sold >= start,
        None => true,
    }
}

/// Result of turning one page of raw listings into records
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub properties: Vec<SoldProperty>,
    /// Raw entries on the page, including duplicates and entries without a URL
    pub extracted: usize,
    /// Entries left after in-page dedup by URL
    pub unique: usize,
}

/// Turns raw listing attribute bags into filtered `SoldProperty` records.
#[derive(Debug, Clone, Default)]
pub struct ListingParser {
    filter: ListingFilter,
}

impl ListingParser {
    pub fn new(filter: ListingFilter) -> Self {
        Self { filter }
    }

    pub fn parse(&self, raw: Vec<RawListing>, area: &Area, today: NaiveDate) -> ParsedPage {
        let extracted = raw.len();
        let mut seen = HashSet::new();
        let unique: Vec<RawListing> = raw
            .into_iter()
            .filter(|listing| !listing.url.is_empty() && seen.insert(listing.url.clone()))
            .collect();

        let unique_count = unique.len();
        let suburb = area.display_name();
        let properties = unique
            .into_iter()
            .filter_map(|listing| self.to_property(listing, &suburb, &area.postcode, today))
            .collect();

        ParsedPage {
            properties,
            extracted,
            unique: unique_count,
        }
    }

    fn accepts_bedrooms(&self, bedrooms: Option<u32>) -> bool {
        match bedrooms {
            Some(beds) => (self.filter.min_bedrooms..=self.filter.max_bedrooms).contains(&beds),
            None => true,
        }
    }

    fn to_property(
        &self,
        listing: RawListing,
        suburb: &str,
        postcode: &str,
        today: NaiveDate,
    ) -> Option<SoldProperty> {
        if !self.accepts_bedrooms(listing.bedrooms) {
            debug!("Skipping {}: {:?} bedrooms", listing.url, listing.bedrooms);
            return None;
        }

        let property_type = listing
            .property_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "House".to_string());
        if !property_type.trim().eq_ignore_ascii_case(&self.filter.property_type) {
            debug!("Skipping {}: type {}", listing.url, property_type);
            return None;
        }

        let sale_date = parse_sold_date(&listing.sold_text);
        if !is_within_window(sale_date.as_deref(), self.filter.recency_days, today) {
            debug!("Skipping {}: sold {:?}", listing.url, sale_date);
            return None;
        }

        Some(SoldProperty {
            address: listing.address,
            suburb: suburb.to_string(),
            postcode: postcode.to_string(),
            sale_price: parse_price(listing.price.as_deref()),
            sale_date,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            parking: listing.parking,
            land_size_sqm: None,
            property_type,
            description: String::new(),
            listing_url: listing.url,
            agent_name: listing.agent_name.filter(|s| !s.is_empty()),
            agency_name: listing.agency_name.filter(|s| !s.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn listing(url: &str, beds: Option<u32>) -> RawListing {
        RawListing {
            url: url.to_string(),
            address: "12 Example St".to_string(),
            price: Some("$1,250,000".to_string()),
            bedrooms: beds,
            sold_text: "Sold on 23 Dec 2025".to_string(),
            property_type: Some("House".to_string()),
            ..Default::default()
        }
    }

    fn area() -> Area {
        Area::new("st-lucia", "4067")
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price(Some("$750,000")), Some(750_000));
        assert_eq!(parse_price(Some("Price not available")), None);
        assert_eq!(parse_price(Some("Contact agent")), None);
        assert_eq!(parse_price(None), None);
    }

    #[test]
    fn sold_date_from_ribbon() {
        assert_eq!(parse_sold_date("Sold on 23 Dec 2025").as_deref(), Some("23 Dec 2025"));
        assert_eq!(parse_sold_date("SOLD 4 January 2026").as_deref(), Some("4 January 2026"));
        assert_eq!(parse_sold_date("2025-12-23").as_deref(), Some("2025-12-23"));
        assert_eq!(parse_sold_date("Sold recently"), None);
    }

    #[test]
    fn land_size_parsing() {
        assert_eq!(parse_land_size("Land: 650 m²"), Some(650));
        assert_eq!(parse_land_size("1,200sqm block"), Some(1200));
        assert_eq!(parse_land_size("405m2"), Some(405));
        assert_eq!(parse_land_size("no land listed"), None);
    }

    #[test]
    fn recency_window() {
        assert!(is_within_window(Some("23 Dec 2025"), 90, today()));
        assert!(!is_within_window(Some("23 Dec 2024"), 90, today()));
        assert!(is_within_window(Some("Sold recently"), 90, today()));
        assert!(is_within_window(None, 90, today()));
        assert!(is_within_window(Some("23/12/2025"), 90, today()));
        assert!(!is_within_window(Some("2025-01-01"), 90, today()));
    }

    #[test]
    fn huge_window_keeps_everything() {
        assert!(is_within_window(Some("23 Dec 2025"), 100_000_000, today()));
        assert!(is_within_window(Some("01/01/1900"), i64::MAX, today()));
    }

    #[test]
    fn negative_window_acts_as_today_only() {
        assert!(is_within_window(Some("2026-01-01"), -5, today()));
        assert!(!is_within_window(Some("2025-12-31"), -5, today()));
    }

    #[test]
    fn bedroom_filter_keeps_unknown() {
        let parser = ListingParser::default();
        let raw = vec![
            listing("https://x.test/property/2", Some(2)),
            listing("https://x.test/property/3", Some(3)),
            listing("https://x.test/property/4", Some(4)),
            listing("https://x.test/property/5", Some(5)),
            listing("https://x.test/property/none", None),
        ];

        let page = parser.parse(raw, &area(), today());
        let urls: Vec<_> = page.properties.iter().map(|p| p.listing_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://x.test/property/3",
                "https://x.test/property/4",
                "https://x.test/property/none",
            ]
        );
    }

    #[test]
    fn only_houses_pass() {
        let parser = ListingParser::default();
        let mut unit = listing("https://x.test/property/unit", Some(3));
        unit.property_type = Some("Unit".to_string());
        let mut house = listing("https://x.test/property/house", Some(3));
        house.property_type = Some("HOUSE".to_string());

        let page = parser.parse(vec![unit, house], &area(), today());
        assert_eq!(page.properties.len(), 1);
        assert_eq!(page.properties[0].listing_url, "https://x.test/property/house");
    }

    #[test]
    fn duplicate_urls_collapse_to_first() {
        let parser = ListingParser::default();
        let first = listing("https://x.test/property/1", Some(3));
        let mut second = listing("https://x.test/property/1", Some(4));
        second.address = "later duplicate".to_string();
        let no_url = listing("", Some(3));

        let page = parser.parse(vec![first, second, no_url], &area(), today());
        assert_eq!(page.extracted, 3);
        assert_eq!(page.unique, 1);
        assert_eq!(page.properties.len(), 1);
        assert_eq!(page.properties[0].bedrooms, Some(3));
    }

    #[test]
    fn record_fields_are_populated() {
        let parser = ListingParser::default();
        let mut raw = listing("https://x.test/property/9", Some(4));
        raw.agent_name = Some("Jo Smith".to_string());
        raw.agency_name = Some(String::new());

        let page = parser.parse(vec![raw], &area(), today());
        let property = &page.properties[0];
        assert_eq!(property.suburb, "St Lucia");
        assert_eq!(property.postcode, "4067");
        assert_eq!(property.sale_price, Some(1_250_000));
        assert_eq!(property.sale_date.as_deref(), Some("23 Dec 2025"));
        assert_eq!(property.agent_name.as_deref(), Some("Jo Smith"));
        assert_eq!(property.agency_name, None);
    }

    #[test]
    fn stale_sales_are_dropped_and_unknown_dates_kept() {
        let parser = ListingParser::default();
        let mut stale = listing("https://x.test/property/old", Some(3));
        stale.sold_text = "Sold on 23 Dec 2024".to_string();
        let mut vague = listing("https://x.test/property/vague", Some(3));
        vague.sold_text = "Sold recently".to_string();

        let page = parser.parse(vec![stale, vague], &area(), today());
        assert_eq!(page.properties.len(), 1);
        assert_eq!(page.properties[0].listing_url, "https://x.test/property/vague");
        assert_eq!(page.properties[0].sale_date, None);
    }
}
