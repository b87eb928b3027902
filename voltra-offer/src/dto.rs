use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{IncotermName, OfferStatus, OfferUnit, PriceDisplayUnit};

/// One price tier as submitted by the client. `price_wp` is mandatory when
/// the offer displays prices per watt-peak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTierInput {
    pub price: f64,
    pub price_wp: Option<f64>,
    pub qty_from: Option<i32>,
    pub qty_to: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncotermInput {
    pub name: IncotermName,
    pub enabled: bool,
    pub price: f64,
    pub shipping_from_country: String,
    pub pickup_available_in_weeks: i32,
    #[serde(default)]
    pub override_warehouse: bool,
}

/// Normalized create/update payload for a single offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferInput {
    pub warehouse_id: Uuid,
    pub promotion_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub availability_quantity: i32,
    pub min_order_quantity: i32,
    pub min_order_unit: OfferUnit,
    pub price_display_unit: PriceDisplayUnit,
    pub status: Option<OfferStatus>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub shipping_available_from: Option<DateTime<Utc>>,
    /// Explicit lowest-price override; when absent the minimum tier price
    /// is recomputed and persisted.
    pub lowest_price: Option<f64>,
    #[serde(default)]
    pub prices: Vec<PriceTierInput>,
    #[serde(default)]
    pub incoterms: Vec<IncotermInput>,
    /// Uppercased before storage; stored as `delivery_allowed = false` rows.
    #[serde(default)]
    pub excluded_countries: Vec<String>,
}

/// Shared predicate for bulk status-change, bulk delete and export. Always
/// scoped to the caller's business id; every field narrows further.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkFilter {
    #[serde(default)]
    pub ids: Vec<Uuid>,
    pub status: Option<OfferStatus>,
    pub name: Option<String>,
    pub product_name: Option<String>,
    pub warehouse_id: Option<Uuid>,
}

/// Whitelisted sort columns for offer listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    Name,
    LowestPrice,
    PublishAt,
}

impl SortField {
    pub fn as_column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Name => "name",
            SortField::LowestPrice => "lowest_price",
            SortField::PublishAt => "publish_at",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferListQuery {
    /// Matches the offer name or the product name; on owner listings a
    /// term that parses as a UUID also matches the offer id.
    pub term: Option<String>,
    pub status: Option<OfferStatus>,
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Default for OfferListQuery {
    fn default() -> Self {
        Self {
            term: None,
            status: None,
            sort_by: None,
            descending: true,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl OfferListQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100)
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    25
}
