use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Offer status. Stored as text in the database via `Display`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Draft,
    Active,
    Inactive,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 3] = [OfferStatus::Draft, OfferStatus::Active, OfferStatus::Inactive];
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferStatus::Draft => "DRAFT",
            OfferStatus::Active => "ACTIVE",
            OfferStatus::Inactive => "INACTIVE",
        };
        f.write_str(s)
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(OfferStatus::Draft),
            "ACTIVE" => Ok(OfferStatus::Active),
            "INACTIVE" => Ok(OfferStatus::Inactive),
            other => Err(format!("unknown offer status: {other}")),
        }
    }
}

/// Where the offer row originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferSource {
    Web,
    Import,
}

impl fmt::Display for OfferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OfferSource::Web => "WEB",
            OfferSource::Import => "IMPORT",
        })
    }
}

impl FromStr for OfferSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEB" => Ok(OfferSource::Web),
            "IMPORT" => Ok(OfferSource::Import),
            other => Err(format!("unknown offer source: {other}")),
        }
    }
}

/// How tier prices are displayed: absolute, or per watt-peak for solar
/// modules with a rated power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceDisplayUnit {
    Absolute,
    Wp,
}

impl fmt::Display for PriceDisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriceDisplayUnit::Absolute => "ABSOLUTE",
            PriceDisplayUnit::Wp => "WP",
        })
    }
}

impl FromStr for PriceDisplayUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABSOLUTE" => Ok(PriceDisplayUnit::Absolute),
            "WP" => Ok(PriceDisplayUnit::Wp),
            other => Err(format!("unknown price display unit: {other}")),
        }
    }
}

/// Unit the minimum order quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferUnit {
    Pieces,
    Pallets,
    Containers,
}

impl fmt::Display for OfferUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OfferUnit::Pieces => "PIECES",
            OfferUnit::Pallets => "PALLETS",
            OfferUnit::Containers => "CONTAINERS",
        })
    }
}

impl FromStr for OfferUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PIECES" => Ok(OfferUnit::Pieces),
            "PALLETS" => Ok(OfferUnit::Pallets),
            "CONTAINERS" => Ok(OfferUnit::Containers),
            other => Err(format!("unknown offer unit: {other}")),
        }
    }
}

/// Standardized shipping term names. CIF/EXW/FCA are the three the export
/// resolves by fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncotermName {
    Cif,
    Exw,
    Fca,
    Fob,
    Ddp,
}

impl fmt::Display for IncotermName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncotermName::Cif => "CIF",
            IncotermName::Exw => "EXW",
            IncotermName::Fca => "FCA",
            IncotermName::Fob => "FOB",
            IncotermName::Ddp => "DDP",
        })
    }
}

impl FromStr for IncotermName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CIF" => Ok(IncotermName::Cif),
            "EXW" => Ok(IncotermName::Exw),
            "FCA" => Ok(IncotermName::Fca),
            "FOB" => Ok(IncotermName::Fob),
            "DDP" => Ok(IncotermName::Ddp),
            other => Err(format!("unknown incoterm: {other}")),
        }
    }
}

/// Which entity a polymorphic child row hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    Offer,
    Warehouse,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnerKind::Offer => "OFFER",
            OwnerKind::Warehouse => "WAREHOUSE",
        })
    }
}

impl FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFER" => Ok(OwnerKind::Offer),
            "WAREHOUSE" => Ok(OwnerKind::Warehouse),
            other => Err(format!("unknown owner kind: {other}")),
        }
    }
}

/// Tagged owner reference for incoterms and country rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: Uuid,
}

impl OwnerRef {
    pub fn offer(id: Uuid) -> Self {
        Self { kind: OwnerKind::Offer, id }
    }

    pub fn warehouse(id: Uuid) -> Self {
        Self { kind: OwnerKind::Warehouse, id }
    }
}

/// A seller's listing of a product at a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub promotion_id: Option<Uuid>,
    pub status: OfferStatus,
    pub source: OfferSource,
    pub name: String,
    pub description: Option<String>,
    pub availability_quantity: i32,
    pub min_order_quantity: i32,
    pub min_order_unit: OfferUnit,
    pub price_display_unit: PriceDisplayUnit,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub shipping_available_from: Option<DateTime<Utc>>,
    pub lowest_price: Option<f64>,
    pub exported_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity-bracketed price rule. The tier with a null `qty_from` is the
/// base tier; at most one per offer by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTier {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub price: f64,
    pub price_wp: Option<f64>,
    pub qty_from: Option<i32>,
    pub qty_to: Option<i32>,
}

/// Shipping-term record attached to an offer or a warehouse. At most one
/// per name per owner; an offer-level term shadows the warehouse-level one
/// of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incoterm {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub name: IncotermName,
    pub enabled: bool,
    pub price: f64,
    pub shipping_from_country: String,
    pub pickup_available_in_weeks: i32,
    pub override_warehouse: bool,
}

/// Per-country delivery rule. The stored polarity is `delivery_allowed`;
/// "excluded from delivery" is its negation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRule {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub country_code: String,
    pub delivery_allowed: bool,
}

impl CountryRule {
    pub fn is_excluded(&self) -> bool {
        !self.delivery_allowed
    }
}

/// Child rows exclusively owned by an offer, replaced wholesale on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferChildren {
    pub prices: Vec<PriceTier>,
    pub incoterms: Vec<Incoterm>,
    pub countries: Vec<CountryRule>,
}

/// Offer plus the product name, as returned by list/search/bulk queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRecord {
    pub offer: Offer,
    pub product_name: Option<String>,
}

/// Fully loaded offer: children plus the warehouse-level incoterms and
/// country rules needed for the merge view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDetails {
    pub offer: Offer,
    pub children: OfferChildren,
    pub product_name: Option<String>,
    pub warehouse_incoterms: Vec<Incoterm>,
    pub warehouse_countries: Vec<CountryRule>,
}

/// An entry in a user's offer view history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewedOffer {
    pub offer: Offer,
    pub product_name: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

/// Truncate to at most `max` characters, on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Merge offer- and warehouse-level incoterms: an offer-level term
/// suppresses the warehouse-level term of the same name.
pub fn merge_incoterms(offer_terms: &[Incoterm], warehouse_terms: &[Incoterm]) -> Vec<Incoterm> {
    let mut merged: Vec<Incoterm> = offer_terms.to_vec();
    for term in warehouse_terms {
        if !offer_terms.iter().any(|t| t.name == term.name) {
            merged.push(term.clone());
        }
    }
    merged
}

/// Merge offer- and warehouse-level country rules: an offer-level rule
/// suppresses the warehouse-level rule for the same country.
pub fn merge_country_rules(
    offer_rules: &[CountryRule],
    warehouse_rules: &[CountryRule],
) -> Vec<CountryRule> {
    let mut merged: Vec<CountryRule> = offer_rules.to_vec();
    for rule in warehouse_rules {
        if !offer_rules
            .iter()
            .any(|r| r.country_code == rule.country_code)
        {
            merged.push(rule.clone());
        }
    }
    merged
}
