use crate::models::{PropertyDetails, RawListing};
use crate::scrapers::onthehouse::absolute_url;
use crate::scrapers::parser::parse_land_size;
use crate::scrapers::traits::ExtractionStrategy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Text of an element with whitespace-separated text nodes
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn capture_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid regex {pattern}: {e}"))
}

/// Selector rules for onthehouse.com.au result and listing pages
pub struct OnTheHouseMarkup {
    card: Selector,
    link: Selector,
    ribbon: Selector,
    price: Selector,
    address: Selector,
    attributes: Selector,
    agent: Selector,
    agent_name: Selector,
    agency_name: Selector,
    next_page: Selector,
    body: Selector,
    land_blocks: Selector,
    detail_rows: Selector,
    description: Selector,
    beds_attr: Regex,
    baths_attr: Regex,
    cars_attr: Regex,
    type_label: Regex,
    land_label: Regex,
    land_word: Regex,
    first_number: Regex,
    beds_label: Regex,
    baths_label: Regex,
    parking_label: Regex,
}

impl OnTheHouseMarkup {
    pub const CARD_SELECTOR: &'static str = r#"[class*="PropertyCardSearch__propertyCard--"]"#;

    pub fn new() -> Self {
        Self {
            card: selector(Self::CARD_SELECTOR),
            link: selector(r#"a[href*="/property/"]"#),
            ribbon: selector(r#"[class*="recentlySold"]"#),
            price: selector(r#"[class*="propertyCardPrice"]"#),
            address: selector(r#"[class*="propertyCardAddressText"]"#),
            attributes: selector(r#"[class*="propertyCardAttributes"]"#),
            agent: selector(r#"[class*="agentRep"]"#),
            agent_name: selector(r#".bold500, [class*="bold"]"#),
            agency_name: selector(r#"[class*="agencyName"]"#),
            next_page: selector(r#"a[rel="next"], [class*="pagination"] a[href*="page="]"#),
            body: selector("body"),
            land_blocks: selector(
                r#"[class*="PropertyAttribute"], [class*="property-attribute"], [class*="feature"]"#,
            ),
            detail_rows: selector(r#"tr, [class*="spec"], [class*="detail"]"#),
            description: selector(
                r#"[class*="description"], [class*="Description"], .property-description, #description"#,
            ),
            beds_attr: regex(r"(?i)Bedrooms[:\s]*?(\d+)"),
            baths_attr: regex(r"(?i)Bathrooms[:\s]*?(\d+)"),
            cars_attr: regex(r"(?i)Car\s*spaces[:\s]*?(\d+)"),
            type_label: regex(r"(?i)Type[:\s]*?(House|Apartment|Townhouse|Land|Unit)"),
            land_label: regex(r"(?i)(?:Land\s*(?:Size|Area)|Block\s*Size)[:\s]*([\d,]+)\s*(?:m²|m2|sqm)"),
            land_word: regex(r"(?i)land"),
            first_number: regex(r"(\d+(?:,\d+)?)"),
            beds_label: regex(r"(?i)(?:Bedrooms?|Beds?)[:\s]*(\d+)"),
            baths_label: regex(r"(?i)(?:Bathrooms?|Baths?)[:\s]*(\d+)"),
            parking_label: regex(r"(?i)(?:Car\s*(?:Spaces?|Parks?)|Parking|Garage)[:\s]*(\d+)"),
        }
    }

    fn first_text(&self, card: ElementRef<'_>, selector: &Selector) -> Option<String> {
        card.select(selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    fn card_listing(&self, card: ElementRef<'_>) -> Option<RawListing> {
        let url = card
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(absolute_url)
            .unwrap_or_default();

        let address = card
            .select(&self.address)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let address = address.trim_end().trim_end_matches(',').trim_end().to_string();

        if url.is_empty() && address.is_empty() {
            return None;
        }

        let mut listing = RawListing {
            url,
            address,
            price: self.first_text(card, &self.price),
            sold_text: self.first_text(card, &self.ribbon).unwrap_or_default(),
            ..Default::default()
        };

        if let Some(attrs) = self.first_text(card, &self.attributes) {
            listing.bedrooms = capture_count(&self.beds_attr, &attrs);
            listing.bathrooms = capture_count(&self.baths_attr, &attrs);
            listing.parking = capture_count(&self.cars_attr, &attrs);
        }

        let card_text = element_text(card);
        listing.property_type = self
            .type_label
            .captures(&card_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        if let Some(agent) = card.select(&self.agent).next() {
            listing.agent_name = self.first_text(agent, &self.agent_name);
            listing.agency_name = self.first_text(agent, &self.agency_name);
        }

        Some(listing)
    }

    fn land_size(&self, document: &Html, page_text: &str) -> Option<i64> {
        if let Some(size) = self
            .land_label
            .captures(page_text)
            .and_then(|c| c[1].replace(',', "").parse().ok())
        {
            return Some(size);
        }

        let from_blocks = document
            .select(&self.land_blocks)
            .map(element_text)
            .filter(|text| self.land_word.is_match(text))
            .find_map(|text| parse_land_size(&text));
        if from_blocks.is_some() {
            return from_blocks;
        }

        // detail tables often drop the unit; anything under 100 is a room count
        document
            .select(&self.detail_rows)
            .map(element_text)
            .filter(|text| self.land_word.is_match(text))
            .filter_map(|text| {
                let caps = self.first_number.captures(&text)?;
                caps[1].replace(',', "").parse::<i64>().ok()
            })
            .find(|size| *size > 100)
    }
}

impl Default for OnTheHouseMarkup {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for OnTheHouseMarkup {
    fn card_selector(&self) -> &str {
        Self::CARD_SELECTOR
    }

    fn listings(&self, document: &Html) -> Vec<RawListing> {
        document
            .select(&self.card)
            .enumerate()
            .filter_map(|(idx, card)| {
                let listing = self.card_listing(card);
                if listing.is_none() {
                    debug!("Skipped card {}: no address or link", idx);
                }
                listing
            })
            .collect()
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document.select(&self.next_page).next().is_some()
    }

    fn details(&self, document: &Html) -> PropertyDetails {
        let page_text = document
            .select(&self.body)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(document.root_element()));

        let description = document
            .select(&self.description)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .map(|t| t.chars().take(MAX_DESCRIPTION_CHARS).collect::<String>());

        PropertyDetails {
            land_size_sqm: self.land_size(document, &page_text),
            description,
            bedrooms: capture_count(&self.beds_label, &page_text),
            bathrooms: capture_count(&self.baths_label, &page_text),
            parking: capture_count(&self.parking_label, &page_text),
        }
    }
}
