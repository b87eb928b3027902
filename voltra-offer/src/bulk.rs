use uuid::Uuid;
use voltra_core::identity::Actor;
use voltra_core::search::SearchDocument;

use crate::dto::{BulkFilter, OfferInput};
use crate::lifecycle::{OfferError, OfferManager};
use crate::models::{Offer, OfferRecord, OfferStatus};
use crate::repository::PublishGuard;

/// Publish-date precondition for a bulk transition: rows violating it are
/// left untouched and excluded from the affected count.
pub fn publish_guard(target: OfferStatus) -> PublishGuard {
    match target {
        OfferStatus::Active => PublishGuard::RequireUnpublished,
        OfferStatus::Draft => PublishGuard::RequirePublished,
        OfferStatus::Inactive => PublishGuard::None,
    }
}

fn docs(records: &[OfferRecord]) -> Vec<SearchDocument> {
    records
        .iter()
        .map(|record| SearchDocument {
            id: record.offer.id,
            name: record.offer.name.clone(),
            product_name: record.product_name.clone(),
            status: record.offer.status.to_string(),
            lowest_price: record.offer.lowest_price,
            updated_at: record.offer.updated_at,
        })
        .collect()
}

impl OfferManager {
    /// Bulk status change over the shared filter. Returns the number of
    /// rows actually moved; the search index is resynced for those rows
    /// synchronously.
    pub async fn update_bulk_status(
        &self,
        actor: &Actor,
        filter: &BulkFilter,
        target: OfferStatus,
    ) -> Result<u64, OfferError> {
        let updated = self
            .store()
            .update_status_bulk(actor.business_id, filter, target, publish_guard(target))
            .await?;

        if !updated.is_empty() {
            self.indexer().resync(&docs(&updated)).await?;
        }

        tracing::info!(
            business_id = %actor.business_id,
            target = %target,
            affected = updated.len(),
            "bulk status update"
        );

        Ok(updated.len() as u64)
    }

    /// Applies the same full update to each listed offer, one at a time.
    /// A failing item is logged and skipped so it never blocks its
    /// siblings; the offers that did go through are returned.
    pub async fn update_bulk(
        &self,
        actor: &Actor,
        ids: &[Uuid],
        input: &OfferInput,
    ) -> Vec<Offer> {
        let mut updated = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.update(actor, id, input.clone()).await {
                Ok(offer) => updated.push(offer),
                Err(err) => {
                    tracing::error!(offer_id = %id, error = %err, "bulk update item skipped");
                }
            }
        }

        tracing::info!(
            business_id = %actor.business_id,
            requested = ids.len(),
            affected = updated.len(),
            "bulk update"
        );

        updated
    }

    /// Bulk delete over the shared filter. The guard derives from the
    /// filter's status the same way the status change does.
    pub async fn delete_bulk(
        &self,
        actor: &Actor,
        filter: &BulkFilter,
    ) -> Result<u64, OfferError> {
        let guard = filter.status.map(publish_guard).unwrap_or(PublishGuard::None);
        let deleted = self
            .store()
            .delete_bulk(actor.business_id, filter, guard)
            .await?;

        if !deleted.is_empty() {
            self.indexer().remove(&deleted).await?;
        }

        Ok(deleted.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_follows_target_status() {
        assert_eq!(publish_guard(OfferStatus::Active), PublishGuard::RequireUnpublished);
        assert_eq!(publish_guard(OfferStatus::Draft), PublishGuard::RequirePublished);
        assert_eq!(publish_guard(OfferStatus::Inactive), PublishGuard::None);
    }
}
