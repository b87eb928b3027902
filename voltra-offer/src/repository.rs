use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use voltra_core::BoxError;

use crate::dto::{BulkFilter, OfferListQuery, PageQuery};
use crate::models::{Offer, OfferChildren, OfferDetails, OfferRecord, OfferStatus, ViewedOffer};

/// Extra predicate applied by bulk mutations on top of the shared filter:
/// activating only touches never-published rows, reverting to draft only
/// touches published ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishGuard {
    None,
    RequireUnpublished,
    RequirePublished,
}

/// Repository trait for offer data access. Implementations must make
/// `save` atomic: the offer row and the wholesale replacement of its child
/// rows commit or roll back together.
#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<OfferDetails>, BoxError>;

    /// Upsert the offer row; when `children` is given, delete the existing
    /// child rows and insert the new set in the same transaction.
    async fn save(&self, offer: &Offer, children: Option<&OfferChildren>) -> Result<(), BoxError>;

    async fn delete(&self, id: Uuid) -> Result<bool, BoxError>;

    /// Owner listing; `scope` is None for admin callers.
    async fn list(
        &self,
        scope: Option<Uuid>,
        query: &OfferListQuery,
    ) -> Result<Vec<OfferRecord>, BoxError>;

    /// Public search over active offers.
    async fn search(&self, query: &OfferListQuery) -> Result<Vec<OfferRecord>, BoxError>;

    async fn counters(&self, scope: Option<Uuid>) -> Result<Vec<(OfferStatus, i64)>, BoxError>;

    /// Set the status on all rows matching filter + guard, returning the
    /// affected rows for index resync.
    async fn update_status_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        target: OfferStatus,
        guard: PublishGuard,
    ) -> Result<Vec<OfferRecord>, BoxError>;

    /// Delete all rows matching filter + guard, returning the deleted ids.
    async fn delete_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        guard: PublishGuard,
    ) -> Result<Vec<Uuid>, BoxError>;

    /// Export selection: filter + business scope, `created_at > cutoff`,
    /// newest first, capped at `limit` rows, children loaded.
    async fn export_candidates(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OfferDetails>, BoxError>;

    async fn mark_exported(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<(), BoxError>;

    async fn record_view(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BoxError>;

    async fn viewed_offers(
        &self,
        user_id: Uuid,
        query: &PageQuery,
    ) -> Result<Vec<ViewedOffer>, BoxError>;
}
