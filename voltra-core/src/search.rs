use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BoxError;

/// Flattened view of an offer as mirrored into the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: Uuid,
    pub name: String,
    pub product_name: Option<String>,
    pub status: String,
    pub lowest_price: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Search-index mirror. Resync runs synchronously on the success path of a
/// mutation; a failure here propagates to the caller (no retry, no backoff).
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn resync(&self, docs: &[SearchDocument]) -> Result<(), BoxError>;

    async fn remove(&self, ids: &[Uuid]) -> Result<(), BoxError>;
}
