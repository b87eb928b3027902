use std::sync::Arc;

use prometheus::{IntCounter, Registry};
use voltra_offer::{ExportService, OfferManager};

// Token lifetimes are the identity platform's concern; validation relies
// on the claim's own exp.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Request counters exposed on /metrics.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub offers_created: IntCounter,
    pub offers_exported: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let offers_created =
            IntCounter::new("voltra_offers_created_total", "Offers created via the API")?;
        let offers_exported =
            IntCounter::new("voltra_offer_exports_total", "Offer export runs via the API")?;
        registry.register(Box::new(offers_created.clone()))?;
        registry.register(Box::new(offers_exported.clone()))?;
        Ok(Self {
            registry,
            offers_created,
            offers_exported,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub offers: Arc<OfferManager>,
    pub exports: Arc<ExportService>,
    pub auth: AuthConfig,
    pub metrics: Metrics,
}
