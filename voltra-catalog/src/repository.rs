use async_trait::async_trait;
use uuid::Uuid;
use voltra_core::BoxError;

use crate::product::Product;

/// Repository trait for catalog product access.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError>;
}
