use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use voltra_core::identity::Actor;
use voltra_core::report::{BlobStore, ErrorReporter, SpreadsheetWriter};

use crate::dto::BulkFilter;
use crate::lifecycle::OfferError;
use crate::models::{Incoterm, IncotermName, OfferDetails, PriceDisplayUnit, PriceTier};
use crate::repository::OfferStore;

/// Storage namespace exported artifacts land under.
const EXPORT_COLLECTION: &str = "offers";

/// Marker written for an incoterm that exists but is switched off.
const DISABLED_MARKER: &str = "DISABLED";

/// Incoterms resolved by fixed name, in resolution order.
const EXPORTED_INCOTERMS: [IncotermName; 3] =
    [IncotermName::Cif, IncotermName::Exw, IncotermName::Fca];

const FIXED_COLUMNS: [&str; 13] = [
    "offer_id",
    "name",
    "status",
    "availability_quantity",
    "min_order_quantity",
    "min_order_unit",
    "price_display_unit",
    "cif_price",
    "exw_price",
    "fca_price",
    "shipping_from_country",
    "pickup_available_in_weeks",
    "excluded_countries",
];

/// How the export result is delivered. `rows` returns the raw matrix and
/// exists for debugging; the production values are file, stream and
/// download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    File,
    Stream,
    Download,
    Rows,
}

#[derive(Debug)]
pub enum ExportOutput {
    /// Server-relative path of the stored spreadsheet.
    File { path: String },
    /// Spreadsheet bytes for direct download, plus the stored path.
    Download { path: String, bytes: Vec<u8> },
    /// Simplified 5-column CSV body.
    Stream { csv: Vec<u8> },
    /// In-memory matrix, debug only.
    Rows {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone)]
pub struct ExportSheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn fmt_amount(value: f64) -> String {
    format!("{value}")
}

fn display_price(tier: &PriceTier, unit: PriceDisplayUnit) -> f64 {
    match unit {
        PriceDisplayUnit::Wp => tier.price_wp.unwrap_or(tier.price),
        PriceDisplayUnit::Absolute => tier.price,
    }
}

/// Incoterm cell value: price in major units when enabled and overriding
/// the warehouse, the disabled marker when present but off, blank when
/// absent (or present without the override).
fn incoterm_cell(terms: &[Incoterm], name: IncotermName) -> String {
    match terms.iter().find(|t| t.name == name) {
        None => String::new(),
        Some(term) if !term.enabled => DISABLED_MARKER.to_string(),
        Some(term) if term.override_warehouse => fmt_amount(term.price / 100.0),
        Some(_) => String::new(),
    }
}

/// First of CIF/EXW/FCA present on the offer, whatever its enabled state.
fn shipping_origin(terms: &[Incoterm]) -> Option<&Incoterm> {
    EXPORTED_INCOTERMS
        .iter()
        .find_map(|name| terms.iter().find(|t| t.name == *name))
}

fn base_tier(tiers: &[PriceTier]) -> Option<&PriceTier> {
    tiers.iter().find(|t| t.qty_from.is_none())
}

fn range_tiers(tiers: &[PriceTier]) -> Vec<&PriceTier> {
    let mut ranged: Vec<&PriceTier> = tiers.iter().filter(|t| t.qty_from.is_some()).collect();
    ranged.sort_by_key(|t| t.qty_from);
    ranged
}

fn excluded_countries(details: &OfferDetails) -> String {
    details
        .children
        .countries
        .iter()
        .filter(|rule| rule.is_excluded())
        .map(|rule| rule.country_code.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Flatten a selection into the tabular export format. The widest offer
/// (most range tiers) sizes the trailing header columns.
pub fn build_sheet(records: &[OfferDetails]) -> ExportSheet {
    let mut max_tiers = 0usize;
    let mut bodies: Vec<(Vec<String>, Vec<(String, String)>)> = Vec::with_capacity(records.len());

    for details in records {
        let offer = &details.offer;
        let terms = &details.children.incoterms;

        let origin = shipping_origin(terms);
        let base = base_tier(&details.children.prices);
        let base_price = base
            .map(|tier| fmt_amount(display_price(tier, offer.price_display_unit)))
            .unwrap_or_default();

        let mut fixed = vec![
            offer.id.to_string(),
            offer.name.clone(),
            offer.status.to_string(),
            offer.availability_quantity.to_string(),
            offer.min_order_quantity.to_string(),
            offer.min_order_unit.to_string(),
            offer.price_display_unit.to_string(),
            incoterm_cell(terms, IncotermName::Cif),
            incoterm_cell(terms, IncotermName::Exw),
            incoterm_cell(terms, IncotermName::Fca),
            origin
                .map(|t| t.shipping_from_country.clone())
                .unwrap_or_default(),
            origin
                .map(|t| t.pickup_available_in_weeks.to_string())
                .unwrap_or_default(),
            excluded_countries(details),
        ];
        fixed.push(base_price);
        fixed.push(offer.min_order_quantity.to_string());

        let ranges: Vec<(String, String)> = range_tiers(&details.children.prices)
            .into_iter()
            .map(|tier| {
                (
                    tier.qty_from.map(|q| q.to_string()).unwrap_or_default(),
                    fmt_amount(display_price(tier, offer.price_display_unit)),
                )
            })
            .collect();

        max_tiers = max_tiers.max(ranges.len());
        bodies.push((fixed, ranges));
    }

    let pairs = max_tiers + 2;
    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.push("price".to_string());
    header.push("quantity".to_string());
    for n in 1..=pairs {
        header.push(format!("price_range_min_qty_{n}"));
        header.push(format!("price_range_amount_{n}"));
    }

    let rows = bodies
        .into_iter()
        .map(|(mut row, ranges)| {
            for n in 0..pairs {
                match ranges.get(n) {
                    Some((qty, amount)) => {
                        row.push(qty.clone());
                        row.push(amount.clone());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
            row
        })
        .collect();

    ExportSheet { header, rows }
}

/// Simplified streaming format: id, name, price, incoterm, countries.
fn stream_csv(records: &[OfferDetails]) -> Result<Vec<u8>, OfferError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", "name", "price", "incoterm", "countries"])
        .map_err(|e| OfferError::Store(Box::new(e)))?;

    for details in records {
        let offer = &details.offer;
        let base = base_tier(&details.children.prices)
            .map(|tier| fmt_amount(display_price(tier, offer.price_display_unit)))
            .unwrap_or_default();
        let incoterm = shipping_origin(&details.children.incoterms)
            .map(|t| t.name.to_string())
            .unwrap_or_default();

        writer
            .write_record([
                offer.id.to_string(),
                offer.name.clone(),
                base,
                incoterm,
                excluded_countries(details),
            ])
            .map_err(|e| OfferError::Store(Box::new(e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| OfferError::Store(Box::new(e)))
}

fn export_path(collection: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("export/{collection}/{token}/export_offers.xlsx")
}

/// Bulk offer export. Selection reuses the shared bulk filter; failures
/// are captured to the error tracker and still surfaced as `Err` to the
/// caller.
pub struct ExportService {
    store: Arc<dyn OfferStore>,
    blobs: Arc<dyn BlobStore>,
    sheets: Arc<dyn SpreadsheetWriter>,
    reporter: Arc<dyn ErrorReporter>,
    row_cap: i64,
    max_age_days: i64,
}

impl ExportService {
    pub fn new(
        store: Arc<dyn OfferStore>,
        blobs: Arc<dyn BlobStore>,
        sheets: Arc<dyn SpreadsheetWriter>,
        reporter: Arc<dyn ErrorReporter>,
        row_cap: i64,
        max_age_days: i64,
    ) -> Self {
        Self {
            store,
            blobs,
            sheets,
            reporter,
            row_cap,
            max_age_days,
        }
    }

    pub async fn export(
        &self,
        actor: &Actor,
        filter: &BulkFilter,
        mode: ExportMode,
    ) -> Result<ExportOutput, OfferError> {
        match self.run(actor, filter, mode).await {
            Ok(output) => Ok(output),
            Err(err) => {
                self.reporter.capture("offer export", &err);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        actor: &Actor,
        filter: &BulkFilter,
        mode: ExportMode,
    ) -> Result<ExportOutput, OfferError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.max_age_days);

        let records = self
            .store
            .export_candidates(actor.business_id, filter, cutoff, self.row_cap)
            .await?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.offer.id).collect();
        if !ids.is_empty() {
            self.store.mark_exported(&ids, now).await?;
        }

        tracing::info!(
            business_id = %actor.business_id,
            rows = records.len(),
            ?mode,
            "offer export"
        );

        match mode {
            ExportMode::Rows => {
                let sheet = build_sheet(&records);
                Ok(ExportOutput::Rows {
                    header: sheet.header,
                    rows: sheet.rows,
                })
            }
            ExportMode::Stream => Ok(ExportOutput::Stream {
                csv: stream_csv(&records)?,
            }),
            ExportMode::File | ExportMode::Download => {
                let sheet = build_sheet(&records);
                let bytes = self
                    .sheets
                    .write(&sheet.header, &sheet.rows)
                    .map_err(OfferError::Store)?;
                let path = self
                    .blobs
                    .put(&export_path(EXPORT_COLLECTION), &bytes)
                    .await
                    .map_err(OfferError::Store)?;

                if mode == ExportMode::Download {
                    Ok(ExportOutput::Download { path, bytes })
                } else {
                    Ok(ExportOutput::File { path })
                }
            }
        }
    }
}
