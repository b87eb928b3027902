use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use voltra_catalog::{Product, ProductParameter, ProductStatus, ProductStore};
use voltra_core::BoxError;

pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ParameterRow {
    name: String,
    value: String,
}

fn parse_status(raw: &str) -> Result<ProductStatus, BoxError> {
    match raw {
        "ACTIVE" => Ok(ProductStatus::Active),
        "INACTIVE" => Ok(ProductStatus::Inactive),
        other => Err(format!("unknown product status: {other}").into()),
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, BoxError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, status, created_at, updated_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parameters: Vec<ParameterRow> = sqlx::query_as(
            "SELECT name, value FROM product_parameters WHERE product_id = $1 ORDER BY name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Product {
            id: row.id,
            name: row.name,
            status: parse_status(&row.status)?,
            parameters: parameters
                .into_iter()
                .map(|p| ProductParameter {
                    name: p.name,
                    value: p.value,
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}
