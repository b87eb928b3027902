use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;
use uuid::Uuid;

use voltra_core::search::{SearchDocument, SearchIndexer};
use voltra_core::BoxError;

/// Keeps the public search keyspace in step with the offers table. Each
/// active offer is stored as a JSON document under `search:offer:{id}`.
#[derive(Clone)]
pub struct RedisSearchIndexer {
    client: redis::Client,
}

impl RedisSearchIndexer {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(id: Uuid) -> String {
        format!("search:offer:{}", id)
    }
}

#[async_trait]
impl SearchIndexer for RedisSearchIndexer {
    async fn resync(&self, docs: &[SearchDocument]) -> Result<(), BoxError> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        for doc in docs {
            let payload = serde_json::to_string(doc)?;
            conn.set::<_, _, ()>(Self::key(doc.id), payload).await?;
        }
        info!("Search index resynced: {} offers", docs.len());
        Ok(())
    }

    async fn remove(&self, ids: &[Uuid]) -> Result<(), BoxError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = ids.iter().copied().map(Self::key).collect();
        conn.del::<_, ()>(keys).await?;
        info!("Search index entries removed: {}", ids.len());
        Ok(())
    }
}
