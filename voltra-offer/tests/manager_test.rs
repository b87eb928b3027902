use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use voltra_catalog::{Product, ProductParameter, ProductStatus, ProductStore, MODULE_POWER_PARAM};
use voltra_core::identity::{Actor, Permission};
use voltra_core::report::{BlobStore, ErrorReporter, SpreadsheetWriter};
use voltra_core::search::{SearchDocument, SearchIndexer};
use voltra_core::BoxError;
use voltra_offer::{
    BulkFilter, CountryRule, ExportMode, ExportOutput, ExportService, Offer, OfferChildren,
    OfferDetails, OfferError, OfferInput, OfferListQuery, OfferManager, OfferRecord, OfferStatus,
    OfferStore, OfferUnit, OwnerRef, PageQuery, PriceDisplayUnit, PriceTierInput, PublishGuard,
    ViewedOffer,
};

// ============================================================================
// In-memory doubles
// ============================================================================

#[derive(Default)]
struct MemState {
    offers: HashMap<Uuid, Offer>,
    children: HashMap<Uuid, OfferChildren>,
    warehouse_countries: HashMap<Uuid, Vec<CountryRule>>,
    views: Vec<(Uuid, Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
struct MemOfferStore {
    state: Mutex<MemState>,
}

impl MemOfferStore {
    fn matches(offer: &Offer, business_id: Uuid, filter: &BulkFilter) -> bool {
        if offer.business_id != business_id {
            return false;
        }
        if !filter.ids.is_empty() && !filter.ids.contains(&offer.id) {
            return false;
        }
        if let Some(status) = filter.status {
            if offer.status != status {
                return false;
            }
        }
        if let Some(name) = &filter.name {
            if !offer.name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            if offer.warehouse_id != warehouse_id {
                return false;
            }
        }
        true
    }

    fn guard_passes(offer: &Offer, guard: PublishGuard) -> bool {
        match guard {
            PublishGuard::None => true,
            PublishGuard::RequireUnpublished => offer.publish_at.is_none(),
            PublishGuard::RequirePublished => offer.publish_at.is_some(),
        }
    }

    fn details(state: &MemState, offer: &Offer) -> OfferDetails {
        OfferDetails {
            offer: offer.clone(),
            children: state.children.get(&offer.id).cloned().unwrap_or_default(),
            product_name: None,
            warehouse_incoterms: vec![],
            warehouse_countries: state
                .warehouse_countries
                .get(&offer.warehouse_id)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl OfferStore for MemOfferStore {
    async fn get(&self, id: Uuid) -> Result<Option<OfferDetails>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state.offers.get(&id).map(|o| Self::details(&state, o)))
    }

    async fn save(&self, offer: &Offer, children: Option<&OfferChildren>) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        state.offers.insert(offer.id, offer.clone());
        if let Some(children) = children {
            state.children.insert(offer.id, children.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.children.remove(&id);
        Ok(state.offers.remove(&id).is_some())
    }

    async fn list(
        &self,
        scope: Option<Uuid>,
        _query: &OfferListQuery,
    ) -> Result<Vec<OfferRecord>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .offers
            .values()
            .filter(|o| scope.map(|b| o.business_id == b).unwrap_or(true))
            .map(|o| OfferRecord {
                offer: o.clone(),
                product_name: None,
            })
            .collect())
    }

    async fn search(&self, _query: &OfferListQuery) -> Result<Vec<OfferRecord>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .offers
            .values()
            .filter(|o| o.status == OfferStatus::Active)
            .map(|o| OfferRecord {
                offer: o.clone(),
                product_name: None,
            })
            .collect())
    }

    async fn counters(&self, scope: Option<Uuid>) -> Result<Vec<(OfferStatus, i64)>, BoxError> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<OfferStatus, i64> = HashMap::new();
        for offer in state.offers.values() {
            if scope.map(|b| offer.business_id == b).unwrap_or(true) {
                *counts.entry(offer.status).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn update_status_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        target: OfferStatus,
        guard: PublishGuard,
    ) -> Result<Vec<OfferRecord>, BoxError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<Uuid> = state
            .offers
            .values()
            .filter(|o| Self::matches(o, business_id, filter) && Self::guard_passes(o, guard))
            .map(|o| o.id)
            .collect();

        let mut updated = Vec::new();
        for id in ids {
            if let Some(offer) = state.offers.get_mut(&id) {
                offer.status = target;
                updated.push(OfferRecord {
                    offer: offer.clone(),
                    product_name: None,
                });
            }
        }
        Ok(updated)
    }

    async fn delete_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        guard: PublishGuard,
    ) -> Result<Vec<Uuid>, BoxError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<Uuid> = state
            .offers
            .values()
            .filter(|o| Self::matches(o, business_id, filter) && Self::guard_passes(o, guard))
            .map(|o| o.id)
            .collect();
        for id in &ids {
            state.offers.remove(id);
            state.children.remove(id);
        }
        Ok(ids)
    }

    async fn export_candidates(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OfferDetails>, BoxError> {
        let state = self.state.lock().unwrap();
        let mut matched: Vec<&Offer> = state
            .offers
            .values()
            .filter(|o| Self::matches(o, business_id, filter) && o.created_at > cutoff)
            .collect();
        matched.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(matched
            .into_iter()
            .take(limit as usize)
            .map(|o| Self::details(&state, o))
            .collect())
    }

    async fn mark_exported(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        for id in ids {
            if let Some(offer) = state.offers.get_mut(id) {
                offer.exported_at = Some(at);
            }
        }
        Ok(())
    }

    async fn record_view(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        self.state.lock().unwrap().views.push((user_id, offer_id, at));
        Ok(())
    }

    async fn viewed_offers(
        &self,
        user_id: Uuid,
        _query: &PageQuery,
    ) -> Result<Vec<ViewedOffer>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .views
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .filter_map(|(_, offer_id, at)| {
                state.offers.get(offer_id).map(|o| ViewedOffer {
                    offer: o.clone(),
                    product_name: None,
                    viewed_at: *at,
                })
            })
            .collect())
    }
}

struct StubProducts {
    products: HashMap<Uuid, Product>,
}

#[async_trait]
impl ProductStore for StubProducts {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        Ok(self.products.get(&id).cloned())
    }
}

#[derive(Default)]
struct RecordingIndexer {
    synced: Mutex<Vec<SearchDocument>>,
    removed: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl SearchIndexer for RecordingIndexer {
    async fn resync(&self, docs: &[SearchDocument]) -> Result<(), BoxError> {
        self.synced.lock().unwrap().extend(docs.iter().cloned());
        Ok(())
    }

    async fn remove(&self, ids: &[Uuid]) -> Result<(), BoxError> {
        self.removed.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

#[derive(Default)]
struct MemBlobs {
    written: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStore for MemBlobs {
    async fn put(&self, path: &str, _bytes: &[u8]) -> Result<String, BoxError> {
        self.written.lock().unwrap().push(path.to_string());
        Ok(path.to_string())
    }
}

struct PlainSheets;

impl SpreadsheetWriter for PlainSheets {
    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, BoxError> {
        let mut out = header.join("\t");
        for row in rows {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        Ok(out.into_bytes())
    }
}

struct NullReporter;

impl ErrorReporter for NullReporter {
    fn capture(&self, _context: &str, _error: &(dyn std::error::Error + 'static)) {}
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    store: Arc<MemOfferStore>,
    indexer: Arc<RecordingIndexer>,
    manager: OfferManager,
    actor: Actor,
    product_id: Uuid,
}

fn harness() -> Harness {
    let product = Product {
        id: Uuid::new_v4(),
        name: "JXS-550 Mono Module".to_string(),
        status: ProductStatus::Active,
        parameters: vec![ProductParameter {
            name: MODULE_POWER_PARAM.to_string(),
            value: "550".to_string(),
        }],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let product_id = product.id;

    let store = Arc::new(MemOfferStore::default());
    let indexer = Arc::new(RecordingIndexer::default());
    let products = Arc::new(StubProducts {
        products: HashMap::from([(product_id, product)]),
    });
    let manager = OfferManager::new(store.clone(), products, indexer.clone());
    let actor = Actor::new(Uuid::new_v4(), Uuid::new_v4(), vec![Permission::Sell]);

    Harness {
        store,
        indexer,
        manager,
        actor,
        product_id,
    }
}

fn input(availability: i32) -> OfferInput {
    OfferInput {
        warehouse_id: Uuid::new_v4(),
        promotion_id: None,
        name: Some("EU stock 550W".to_string()),
        description: None,
        availability_quantity: availability,
        min_order_quantity: 31,
        min_order_unit: OfferUnit::Pieces,
        price_display_unit: PriceDisplayUnit::Absolute,
        status: None,
        publish_at: None,
        expire_at: None,
        shipping_available_from: None,
        lowest_price: None,
        prices: vec![
            PriceTierInput {
                price: 95.0,
                price_wp: None,
                qty_from: None,
                qty_to: None,
            },
            PriceTierInput {
                price: 92.5,
                price_wp: None,
                qty_from: Some(310),
                qty_to: None,
            },
        ],
        incoterms: vec![],
        excluded_countries: vec!["RU".to_string()],
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn create_persists_offer_with_children_and_syncs_index() {
    let h = harness();

    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let details = h.store.get(offer.id).await.unwrap().unwrap();
    assert_eq!(details.children.prices.len(), 2);
    assert_eq!(details.children.countries.len(), 1);
    assert_eq!(details.offer.lowest_price, Some(92.5));

    let synced = h.indexer.synced.lock().unwrap();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].id, offer.id);
}

#[tokio::test]
async fn update_replaces_children_wholesale() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();
    let old_tier_ids: Vec<Uuid> = h
        .store
        .get(offer.id)
        .await
        .unwrap()
        .unwrap()
        .children
        .prices
        .iter()
        .map(|t| t.id)
        .collect();

    let mut next = input(1000);
    next.prices = vec![PriceTierInput {
        price: 89.0,
        price_wp: None,
        qty_from: None,
        qty_to: None,
    }];
    let updated = h.manager.update(&h.actor, offer.id, next).await.unwrap();
    assert_eq!(updated.lowest_price, Some(89.0));

    let details = h.store.get(offer.id).await.unwrap().unwrap();
    assert_eq!(details.children.prices.len(), 1);
    assert!(details
        .children
        .prices
        .iter()
        .all(|t| !old_tier_ids.contains(&t.id)));
}

#[tokio::test]
async fn cross_business_update_is_forbidden() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let stranger = Actor::new(Uuid::new_v4(), Uuid::new_v4(), vec![Permission::Sell]);
    let err = h
        .manager
        .update(&stranger, offer.id, input(1000))
        .await
        .unwrap_err();
    assert!(matches!(err, OfferError::Forbidden(_)));

    let admin = Actor::new(Uuid::new_v4(), Uuid::new_v4(), vec![Permission::AdminOffers]);
    assert!(h.manager.update(&admin, offer.id, input(1000)).await.is_ok());
}

#[tokio::test]
async fn delete_removes_offer_from_index() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    assert!(h.manager.delete(&h.actor, offer.id).await.unwrap());
    assert!(h.store.get(offer.id).await.unwrap().is_none());
    assert_eq!(*h.indexer.removed.lock().unwrap(), vec![offer.id]);
}

#[tokio::test]
async fn duplicate_creates_independent_copy() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let copy = h.manager.duplicate(&h.actor, offer.id).await.unwrap();
    assert_ne!(copy.id, offer.id);
    assert_eq!(copy.status, OfferStatus::Draft);
    assert_eq!(copy.name, "EU stock 550W (Copy)");

    let copy_details = h.store.get(copy.id).await.unwrap().unwrap();
    let source_details = h.store.get(offer.id).await.unwrap().unwrap();
    assert_eq!(
        copy_details.children.prices.len(),
        source_details.children.prices.len()
    );
}

#[tokio::test]
async fn viewing_details_records_history() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    h.manager
        .details(Some(&h.actor), offer.id)
        .await
        .unwrap();

    let viewed = h
        .manager
        .viewed_offers(&h.actor, &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(viewed.len(), 1);
    assert_eq!(viewed[0].offer.id, offer.id);
}

#[tokio::test]
async fn details_merges_warehouse_country_rules() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    // The warehouse excludes CN and allows RU; the offer itself excludes RU.
    {
        let mut state = h.store.state.lock().unwrap();
        state.warehouse_countries.insert(
            offer.warehouse_id,
            vec![
                CountryRule {
                    id: Uuid::new_v4(),
                    owner: OwnerRef::warehouse(offer.warehouse_id),
                    country_code: "CN".to_string(),
                    delivery_allowed: false,
                },
                CountryRule {
                    id: Uuid::new_v4(),
                    owner: OwnerRef::warehouse(offer.warehouse_id),
                    country_code: "RU".to_string(),
                    delivery_allowed: true,
                },
            ],
        );
    }

    let details = h.manager.details(None, offer.id).await.unwrap();

    assert_eq!(details.children.countries.len(), 2);
    let cn = details
        .children
        .countries
        .iter()
        .find(|r| r.country_code == "CN")
        .unwrap();
    assert!(cn.is_excluded());
    // The offer-level RU rule wins over the warehouse-level one.
    let ru = details
        .children
        .countries
        .iter()
        .find(|r| r.country_code == "RU")
        .unwrap();
    assert!(ru.is_excluded());
}

// ============================================================================
// Bulk operations
// ============================================================================

#[tokio::test]
async fn bulk_activate_only_touches_unpublished_rows() {
    let h = harness();
    let draft = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let mut published_input = input(1000);
    published_input.status = Some(OfferStatus::Active);
    let published = h
        .manager
        .create(&h.actor, h.product_id, published_input)
        .await
        .unwrap();
    // Park it back in draft while keeping its publish date.
    let mut parked = published.clone();
    parked.status = OfferStatus::Draft;
    h.store.save(&parked, None).await.unwrap();

    let affected = h
        .manager
        .update_bulk_status(&h.actor, &BulkFilter::default(), OfferStatus::Active)
        .await
        .unwrap();

    // Only the never-published draft qualifies.
    assert_eq!(affected, 1);
    let refreshed = h.store.get(draft.id).await.unwrap().unwrap();
    assert_eq!(refreshed.offer.status, OfferStatus::Active);
    let untouched = h.store.get(published.id).await.unwrap().unwrap();
    assert_eq!(untouched.offer.status, OfferStatus::Draft);
}

#[tokio::test]
async fn bulk_delete_respects_filter_and_guard() {
    let h = harness();
    let keep = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();
    let drop = h
        .manager
        .create(&h.actor, h.product_id, input(500))
        .await
        .unwrap();

    let filter = BulkFilter {
        ids: vec![drop.id],
        status: Some(OfferStatus::Draft),
        ..Default::default()
    };
    // Draft guard requires a publish date; a plain draft has none.
    assert_eq!(h.manager.delete_bulk(&h.actor, &filter).await.unwrap(), 0);

    let filter = BulkFilter {
        ids: vec![drop.id],
        ..Default::default()
    };
    assert_eq!(h.manager.delete_bulk(&h.actor, &filter).await.unwrap(), 1);
    assert!(h.store.get(keep.id).await.unwrap().is_some());
    assert!(h.store.get(drop.id).await.unwrap().is_none());
}

#[tokio::test]
async fn bulk_update_skips_failing_items_and_updates_the_rest() {
    let h = harness();
    let first = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();
    let second = h
        .manager
        .create(&h.actor, h.product_id, input(500))
        .await
        .unwrap();

    let mut repriced = input(750);
    repriced.name = Some("Repriced 550W".to_string());

    // The middle id does not exist; its failure must not abort the batch.
    let updated = h
        .manager
        .update_bulk(
            &h.actor,
            &[first.id, Uuid::new_v4(), second.id],
            &repriced,
        )
        .await;

    assert_eq!(updated.len(), 2);
    for id in [first.id, second.id] {
        let refreshed = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(refreshed.offer.name, "Repriced 550W");
        assert_eq!(refreshed.offer.availability_quantity, 750);
    }
}

// ============================================================================
// Export
// ============================================================================

fn export_service(h: &Harness, blobs: Arc<MemBlobs>) -> ExportService {
    ExportService::new(
        h.store.clone(),
        blobs,
        Arc::new(PlainSheets),
        Arc::new(NullReporter),
        10_000,
        365,
    )
}

#[tokio::test]
async fn export_skips_offers_older_than_one_year() {
    let h = harness();
    let now = Utc::now();

    let fresh = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let mut inside = fresh.clone();
    inside.id = Uuid::new_v4();
    inside.created_at = now - Duration::days(365) + Duration::seconds(1);
    h.store.save(&inside, Some(&OfferChildren::default())).await.unwrap();

    let mut outside = fresh.clone();
    outside.id = Uuid::new_v4();
    outside.created_at = now - Duration::days(365) - Duration::seconds(1);
    h.store.save(&outside, Some(&OfferChildren::default())).await.unwrap();

    let service = export_service(&h, Arc::new(MemBlobs::default()));
    let output = service
        .export(&h.actor, &BulkFilter::default(), ExportMode::Rows)
        .await
        .unwrap();

    let ExportOutput::Rows { rows, .. } = output else {
        panic!("expected rows output");
    };
    let ids: Vec<String> = rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&fresh.id.to_string()));
    assert!(ids.contains(&inside.id.to_string()));
    assert!(!ids.contains(&outside.id.to_string()));
}

#[tokio::test]
async fn export_stamps_exported_at_and_stores_file() {
    let h = harness();
    let offer = h
        .manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let blobs = Arc::new(MemBlobs::default());
    let service = export_service(&h, blobs.clone());
    let output = service
        .export(&h.actor, &BulkFilter::default(), ExportMode::File)
        .await
        .unwrap();

    let ExportOutput::File { path } = output else {
        panic!("expected file output");
    };
    assert!(path.starts_with("export/offers/"));
    assert_eq!(*blobs.written.lock().unwrap(), vec![path]);

    let refreshed = h.store.get(offer.id).await.unwrap().unwrap();
    assert!(refreshed.offer.exported_at.is_some());
}

#[tokio::test]
async fn export_stream_returns_csv_body() {
    let h = harness();
    h.manager
        .create(&h.actor, h.product_id, input(1000))
        .await
        .unwrap();

    let service = export_service(&h, Arc::new(MemBlobs::default()));
    let output = service
        .export(&h.actor, &BulkFilter::default(), ExportMode::Stream)
        .await
        .unwrap();

    let ExportOutput::Stream { csv } = output else {
        panic!("expected stream output");
    };
    let text = String::from_utf8(csv).unwrap();
    assert!(text.starts_with("id,name,price,incoterm,countries"));
    assert!(text.lines().count() >= 2);
}
