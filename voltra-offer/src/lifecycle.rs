use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use voltra_catalog::{price_from_wp, supports_wp_pricing, Product, ProductStore};
use voltra_core::identity::{Actor, Permission};
use voltra_core::search::{SearchDocument, SearchIndexer};
use voltra_core::BoxError;

use crate::dto::{OfferInput, OfferListQuery, PageQuery};
use crate::models::{
    merge_country_rules, merge_incoterms, truncate_chars, CountryRule, Incoterm, Offer,
    OfferChildren, OfferDetails, OfferRecord, OfferSource, OfferStatus, OwnerRef,
    PriceDisplayUnit, PriceTier, ViewedOffer,
};
use crate::repository::OfferStore;

/// Auto-defaulted expiry horizon applied when an offer is activated
/// without an explicit expire date.
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Longest offer name derived from a product name, in characters.
pub const NAME_FALLBACK_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("price per watt-peak cannot be set for this product")]
    WpNotSupported,
    #[error("offer not found: {0}")]
    NotFound(Uuid),
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage error: {0}")]
    Store(BoxError),
}

impl From<BoxError> for OfferError {
    fn from(err: BoxError) -> Self {
        OfferError::Store(err)
    }
}

/// Field-level input validation, run before any write.
pub(crate) fn validate_input(input: &OfferInput) -> Result<(), OfferError> {
    if let Some(name) = &input.name {
        if name.chars().count() > 255 {
            return Err(OfferError::Validation("name: at most 255 characters".into()));
        }
    }
    if input.availability_quantity < 0 {
        return Err(OfferError::Validation(
            "availability_quantity: must be zero or positive".into(),
        ));
    }
    if input.min_order_quantity < 1 {
        return Err(OfferError::Validation(
            "min_order_quantity: must be at least 1".into(),
        ));
    }
    if input.price_display_unit == PriceDisplayUnit::Wp {
        for (idx, tier) in input.prices.iter().enumerate() {
            if tier.price_wp.is_none() {
                return Err(OfferError::Validation(format!(
                    "prices[{idx}].price_wp: required for watt-peak pricing"
                )));
            }
        }
    }
    for code in &input.excluded_countries {
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OfferError::Validation(format!(
                "excluded_countries: '{code}' is not an ISO-2 code"
            )));
        }
    }
    Ok(())
}

/// Publish/expire defaulting for a status transition. Dates are only
/// auto-filled when still unset, so re-applying an activation is a no-op;
/// reverting to draft resets both to the caller-supplied values (normally
/// none), which drops earlier auto-defaults.
pub(crate) fn apply_status(
    offer: &mut Offer,
    requested: OfferStatus,
    input_publish: Option<DateTime<Utc>>,
    input_expire: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    offer.status = requested;

    match requested {
        OfferStatus::Active => {
            if offer.publish_at.is_none() {
                offer.publish_at = Some(now);
            }
            if offer.expire_at.is_none() {
                offer.expire_at = Some(now + Duration::days(DEFAULT_EXPIRY_DAYS));
            }
        }
        OfferStatus::Draft => {
            offer.publish_at = input_publish;
            offer.expire_at = input_expire;
        }
        OfferStatus::Inactive => {}
    }

    if offer.availability_quantity == 0 {
        offer.status = OfferStatus::Inactive;
    }
}

/// Assemble the offer row and its replacement children from a validated
/// input. Pure; persistence and index sync happen in the manager.
pub(crate) fn build_offer(
    actor: &Actor,
    product: &Product,
    input: &OfferInput,
    existing: Option<Offer>,
    now: DateTime<Utc>,
) -> Result<(Offer, OfferChildren), OfferError> {
    validate_input(input)?;

    if input.price_display_unit == PriceDisplayUnit::Wp && !supports_wp_pricing(product) {
        return Err(OfferError::WpNotSupported);
    }

    let previous_status = existing.as_ref().map(|o| o.status);

    let mut offer = existing.unwrap_or_else(|| Offer {
        id: Uuid::new_v4(),
        user_id: actor.user_id,
        business_id: actor.business_id,
        product_id: product.id,
        warehouse_id: input.warehouse_id,
        promotion_id: None,
        status: OfferStatus::Draft,
        source: OfferSource::Web,
        name: String::new(),
        description: None,
        availability_quantity: 0,
        min_order_quantity: 1,
        min_order_unit: input.min_order_unit,
        price_display_unit: input.price_display_unit,
        publish_at: None,
        expire_at: None,
        shipping_available_from: None,
        lowest_price: None,
        exported_at: None,
        created_at: now,
        updated_at: now,
    });

    offer.warehouse_id = input.warehouse_id;
    offer.name = input
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| truncate_chars(&product.name, NAME_FALLBACK_LIMIT));
    offer.description = input.description.clone();
    offer.availability_quantity = input.availability_quantity;
    offer.min_order_quantity = input.min_order_quantity;
    offer.min_order_unit = input.min_order_unit;
    offer.price_display_unit = input.price_display_unit;
    offer.updated_at = now;

    if let Some(promotion_id) = input.promotion_id {
        offer.promotion_id = Some(promotion_id);
    }
    if let Some(from) = input.shipping_available_from {
        offer.shipping_available_from = Some(from);
    }
    if let Some(publish_at) = input.publish_at {
        offer.publish_at = Some(publish_at);
    }
    if let Some(expire_at) = input.expire_at {
        offer.expire_at = Some(expire_at);
    }

    let requested = input
        .status
        .or(previous_status)
        .unwrap_or(OfferStatus::Draft);
    apply_status(&mut offer, requested, input.publish_at, input.expire_at, now);

    let children = build_children(&offer, product, input)?;

    // No tiers means no lowest price, even when the input carries an
    // explicit override.
    offer.lowest_price = if children.prices.is_empty() {
        None
    } else {
        match input.lowest_price {
            Some(explicit) => Some(explicit),
            None => voltra_catalog::lowest_price(
                &children.prices.iter().map(|t| t.price).collect::<Vec<_>>(),
            ),
        }
    };

    Ok((offer, children))
}

fn build_children(
    offer: &Offer,
    product: &Product,
    input: &OfferInput,
) -> Result<OfferChildren, OfferError> {
    let owner = OwnerRef::offer(offer.id);

    let mut prices = Vec::with_capacity(input.prices.len());
    for tier in &input.prices {
        let price = match offer.price_display_unit {
            PriceDisplayUnit::Wp => {
                // validate_input guarantees price_wp is present here
                let price_wp = tier.price_wp.unwrap_or_default();
                price_from_wp(product, price_wp)
            }
            PriceDisplayUnit::Absolute => tier.price,
        };
        prices.push(PriceTier {
            id: Uuid::new_v4(),
            offer_id: offer.id,
            price,
            price_wp: tier.price_wp,
            qty_from: tier.qty_from,
            qty_to: tier.qty_to,
        });
    }

    let incoterms = input
        .incoterms
        .iter()
        .map(|term| Incoterm {
            id: Uuid::new_v4(),
            owner,
            name: term.name,
            enabled: term.enabled,
            price: term.price,
            shipping_from_country: term.shipping_from_country.to_uppercase(),
            pickup_available_in_weeks: term.pickup_available_in_weeks,
            override_warehouse: term.override_warehouse,
        })
        .collect();

    let countries = input
        .excluded_countries
        .iter()
        .map(|code| CountryRule {
            id: Uuid::new_v4(),
            owner,
            country_code: code.to_uppercase(),
            delivery_allowed: false,
        })
        .collect();

    Ok(OfferChildren {
        prices,
        incoterms,
        countries,
    })
}

/// Deep copy of an offer and its children: status back to draft, dates and
/// caches cleared, every child re-keyed and reparented.
pub(crate) fn duplicate_offer(details: &OfferDetails, now: DateTime<Utc>) -> (Offer, OfferChildren) {
    let mut copy = details.offer.clone();
    copy.id = Uuid::new_v4();
    copy.name = format!("{} (Copy)", truncate_chars(&details.offer.name, NAME_FALLBACK_LIMIT));
    copy.status = OfferStatus::Draft;
    copy.publish_at = None;
    copy.expire_at = None;
    copy.lowest_price = None;
    copy.exported_at = None;
    copy.created_at = now;
    copy.updated_at = now;

    let owner = OwnerRef::offer(copy.id);
    let children = OfferChildren {
        prices: details
            .children
            .prices
            .iter()
            .map(|tier| PriceTier {
                id: Uuid::new_v4(),
                offer_id: copy.id,
                ..tier.clone()
            })
            .collect(),
        incoterms: details
            .children
            .incoterms
            .iter()
            .map(|term| Incoterm {
                id: Uuid::new_v4(),
                owner,
                ..term.clone()
            })
            .collect(),
        countries: details
            .children
            .countries
            .iter()
            .map(|rule| CountryRule {
                id: Uuid::new_v4(),
                owner,
                ..rule.clone()
            })
            .collect(),
    };

    (copy, children)
}

fn search_doc(offer: &Offer, product_name: Option<String>) -> SearchDocument {
    SearchDocument {
        id: offer.id,
        name: offer.name.clone(),
        product_name,
        status: offer.status.to_string(),
        lowest_price: offer.lowest_price,
        updated_at: offer.updated_at,
    }
}

/// Offer lifecycle service. All collaborators are injected; every mutation
/// persists through one transactional `OfferStore::save` call and then
/// resyncs the search index inline.
pub struct OfferManager {
    store: Arc<dyn OfferStore>,
    products: Arc<dyn ProductStore>,
    indexer: Arc<dyn SearchIndexer>,
}

impl OfferManager {
    pub fn new(
        store: Arc<dyn OfferStore>,
        products: Arc<dyn ProductStore>,
        indexer: Arc<dyn SearchIndexer>,
    ) -> Self {
        Self {
            store,
            products,
            indexer,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn OfferStore> {
        &self.store
    }

    pub(crate) fn indexer(&self) -> &Arc<dyn SearchIndexer> {
        &self.indexer
    }

    pub async fn create(
        &self,
        actor: &Actor,
        product_id: Uuid,
        input: OfferInput,
    ) -> Result<Offer, OfferError> {
        let product = self
            .products
            .get_product(product_id)
            .await?
            .ok_or(OfferError::ProductNotFound(product_id))?;

        let (offer, children) = build_offer(actor, &product, &input, None, Utc::now())?;

        if let Err(err) = self.store.save(&offer, Some(&children)).await {
            tracing::error!(?input, error = %err, "offer store error");
            return Err(err.into());
        }

        self.indexer
            .resync(&[search_doc(&offer, Some(product.name.clone()))])
            .await?;

        Ok(offer)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        offer_id: Uuid,
        input: OfferInput,
    ) -> Result<Offer, OfferError> {
        let details = self.authorized(actor, offer_id).await?;
        let product = self
            .products
            .get_product(details.offer.product_id)
            .await?
            .ok_or(OfferError::ProductNotFound(details.offer.product_id))?;

        let (offer, children) =
            build_offer(actor, &product, &input, Some(details.offer), Utc::now())?;

        if let Err(err) = self.store.save(&offer, Some(&children)).await {
            tracing::error!(offer_id = %offer.id, ?input, error = %err, "offer update error");
            return Err(err.into());
        }

        self.indexer
            .resync(&[search_doc(&offer, Some(product.name.clone()))])
            .await?;

        Ok(offer)
    }

    /// Status-only transition with the same publish/expire defaulting as a
    /// full update.
    pub async fn update_status(
        &self,
        actor: &Actor,
        offer_id: Uuid,
        status: OfferStatus,
    ) -> Result<Offer, OfferError> {
        let details = self.authorized(actor, offer_id).await?;
        let mut offer = details.offer;
        apply_status(&mut offer, status, None, None, Utc::now());
        offer.updated_at = Utc::now();

        self.store.save(&offer, None).await?;
        self.indexer
            .resync(&[search_doc(&offer, details.product_name)])
            .await?;

        Ok(offer)
    }

    pub async fn duplicate(&self, actor: &Actor, offer_id: Uuid) -> Result<Offer, OfferError> {
        let details = self.authorized(actor, offer_id).await?;
        let (copy, children) = duplicate_offer(&details, Utc::now());

        if let Err(err) = self.store.save(&copy, Some(&children)).await {
            tracing::error!(source_offer = %offer_id, error = %err, "offer duplicate error");
            return Err(err.into());
        }

        self.indexer
            .resync(&[search_doc(&copy, details.product_name)])
            .await?;

        Ok(copy)
    }

    pub async fn delete(&self, actor: &Actor, offer_id: Uuid) -> Result<bool, OfferError> {
        self.authorized(actor, offer_id).await?;
        let deleted = self.store.delete(offer_id).await?;
        if deleted {
            self.indexer.remove(&[offer_id]).await?;
        }
        Ok(deleted)
    }

    pub async fn details(
        &self,
        actor: Option<&Actor>,
        offer_id: Uuid,
    ) -> Result<OfferDetails, OfferError> {
        let mut details = self
            .store
            .get(offer_id)
            .await?
            .ok_or(OfferError::NotFound(offer_id))?;

        details.children.incoterms =
            merge_incoterms(&details.children.incoterms, &details.warehouse_incoterms);
        details.children.countries =
            merge_country_rules(&details.children.countries, &details.warehouse_countries);

        if let Some(actor) = actor {
            self.store
                .record_view(actor.user_id, offer_id, Utc::now())
                .await?;
        }

        Ok(details)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &OfferListQuery,
    ) -> Result<Vec<OfferRecord>, OfferError> {
        Ok(self.store.list(actor.business_scope(), query).await?)
    }

    pub async fn search(&self, query: &OfferListQuery) -> Result<Vec<OfferRecord>, OfferError> {
        Ok(self.store.search(query).await?)
    }

    /// Offer counts per status. Admin callers see the whole marketplace.
    pub async fn counters(&self, actor: &Actor) -> Result<Vec<(OfferStatus, i64)>, OfferError> {
        Ok(self.store.counters(actor.business_scope()).await?)
    }

    pub async fn viewed_offers(
        &self,
        actor: &Actor,
        query: &PageQuery,
    ) -> Result<Vec<ViewedOffer>, OfferError> {
        Ok(self.store.viewed_offers(actor.user_id, query).await?)
    }

    /// Ownership guard: non-admins may only touch offers of their own
    /// business. Runs before any service logic.
    async fn authorized(&self, actor: &Actor, offer_id: Uuid) -> Result<OfferDetails, OfferError> {
        let details = self
            .store
            .get(offer_id)
            .await?
            .ok_or(OfferError::NotFound(offer_id))?;

        if details.offer.business_id != actor.business_id && !actor.has(Permission::AdminOffers) {
            return Err(OfferError::Forbidden(format!(
                "offer {offer_id} belongs to another business"
            )));
        }

        Ok(details)
    }
}
