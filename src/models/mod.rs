use serde::{Deserialize, Serialize};

/// A sold property, the unit of output.
///
/// `listing_url` is the identity key used for every dedup step. Missing keys
/// default on load so partial records from older files still parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoldProperty {
    pub address: String,
    pub suburb: String,
    pub postcode: String,
    pub sale_price: Option<i64>,
    pub sale_date: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub parking: Option<u32>,
    pub land_size_sqm: Option<i64>,
    pub property_type: String,
    pub description: String,
    pub listing_url: String,
    pub agent_name: Option<String>,
    pub agency_name: Option<String>,
}

impl SoldProperty {
    pub fn has_url(&self) -> bool {
        !self.listing_url.is_empty()
    }

    /// Fill fields that are still unknown from a detail page.
    /// Known values are never overwritten, so applying the same details twice
    /// is a no-op.
    pub fn fill_from(&mut self, details: &PropertyDetails) {
        if self.land_size_sqm.is_none() {
            self.land_size_sqm = details.land_size_sqm;
        }
        if self.description.is_empty() {
            if let Some(description) = details.description.as_deref() {
                self.description = description.to_string();
            }
        }
        if self.bedrooms.is_none() {
            self.bedrooms = details.bedrooms;
        }
        if self.bathrooms.is_none() {
            self.bathrooms = details.bathrooms;
        }
        if self.parking.is_none() {
            self.parking = details.parking;
        }
    }
}

/// Attribute bag for one result card or API content entry, before filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub url: String,
    pub address: String,
    pub price: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub parking: Option<u32>,
    /// Sold ribbon text such as "Sold on 23 Dec 2025", or a bare date.
    pub sold_text: String,
    pub property_type: Option<String>,
    pub agent_name: Option<String>,
    pub agency_name: Option<String>,
}

/// Attributes read from a listing's own page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDetails {
    pub land_size_sqm: Option<i64>,
    pub description: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub parking: Option<u32>,
}
