use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use voltra_core::BoxError;
use voltra_offer::dto::{BulkFilter, OfferListQuery, PageQuery};
use voltra_offer::models::{
    CountryRule, Incoterm, Offer, OfferChildren, OfferDetails, OfferRecord, OfferStatus, OwnerKind,
    OwnerRef, PriceTier, ViewedOffer,
};
use voltra_offer::repository::{OfferStore, PublishGuard};

/// Columns every offer query selects; `product_name` rides along from the
/// joined products table.
const OFFER_COLUMNS: &str = "o.id, o.user_id, o.business_id, o.product_id, o.warehouse_id, \
     o.promotion_id, o.status, o.source, o.name, o.description, o.availability_quantity, \
     o.min_order_quantity, o.min_order_unit, o.price_display_unit, o.publish_at, o.expire_at, \
     o.shipping_available_from, o.lowest_price, o.exported_at, o.created_at, o.updated_at, \
     p.name AS product_name";

const OFFER_FROM: &str = "FROM offers o LEFT JOIN products p ON p.id = o.product_id";

pub struct PostgresOfferStore {
    pool: PgPool,
}

impl PostgresOfferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct OfferRow {
    id: Uuid,
    user_id: Uuid,
    business_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    promotion_id: Option<Uuid>,
    status: String,
    source: String,
    name: String,
    description: Option<String>,
    availability_quantity: i32,
    min_order_quantity: i32,
    min_order_unit: String,
    price_display_unit: String,
    publish_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
    shipping_available_from: Option<DateTime<Utc>>,
    lowest_price: Option<f64>,
    exported_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_name: Option<String>,
}

impl OfferRow {
    fn into_record(self) -> Result<OfferRecord, BoxError> {
        let offer = Offer {
            id: self.id,
            user_id: self.user_id,
            business_id: self.business_id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            promotion_id: self.promotion_id,
            status: self.status.parse().map_err(BoxError::from)?,
            source: self.source.parse().map_err(BoxError::from)?,
            name: self.name,
            description: self.description,
            availability_quantity: self.availability_quantity,
            min_order_quantity: self.min_order_quantity,
            min_order_unit: self.min_order_unit.parse().map_err(BoxError::from)?,
            price_display_unit: self.price_display_unit.parse().map_err(BoxError::from)?,
            publish_at: self.publish_at,
            expire_at: self.expire_at,
            shipping_available_from: self.shipping_available_from,
            lowest_price: self.lowest_price,
            exported_at: self.exported_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(OfferRecord {
            offer,
            product_name: self.product_name,
        })
    }
}

#[derive(FromRow)]
struct PriceRow {
    id: Uuid,
    offer_id: Uuid,
    price: f64,
    price_wp: Option<f64>,
    qty_from: Option<i32>,
    qty_to: Option<i32>,
}

#[derive(FromRow)]
struct IncotermRow {
    id: Uuid,
    owner_kind: String,
    owner_id: Uuid,
    name: String,
    enabled: bool,
    price: f64,
    shipping_from_country: String,
    pickup_available_in_weeks: i32,
    override_warehouse: bool,
}

impl IncotermRow {
    fn into_model(self) -> Result<Incoterm, BoxError> {
        Ok(Incoterm {
            id: self.id,
            owner: OwnerRef {
                kind: self.owner_kind.parse::<OwnerKind>().map_err(BoxError::from)?,
                id: self.owner_id,
            },
            name: self.name.parse().map_err(BoxError::from)?,
            enabled: self.enabled,
            price: self.price,
            shipping_from_country: self.shipping_from_country,
            pickup_available_in_weeks: self.pickup_available_in_weeks,
            override_warehouse: self.override_warehouse,
        })
    }
}

#[derive(FromRow)]
struct CountryRow {
    id: Uuid,
    owner_kind: String,
    owner_id: Uuid,
    country_code: String,
    delivery_allowed: bool,
}

impl CountryRow {
    fn into_model(self) -> Result<CountryRule, BoxError> {
        Ok(CountryRule {
            id: self.id,
            owner: OwnerRef {
                kind: self.owner_kind.parse::<OwnerKind>().map_err(BoxError::from)?,
                id: self.owner_id,
            },
            country_code: self.country_code,
            delivery_allowed: self.delivery_allowed,
        })
    }
}

impl PostgresOfferStore {
    async fn fetch_record(&self, id: Uuid) -> Result<Option<OfferRecord>, BoxError> {
        let row: Option<OfferRow> =
            sqlx::query_as(&format!("SELECT {OFFER_COLUMNS} {OFFER_FROM} WHERE o.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(OfferRow::into_record).transpose()
    }

    async fn load_incoterms(&self, owner: OwnerRef) -> Result<Vec<Incoterm>, BoxError> {
        let rows: Vec<IncotermRow> = sqlx::query_as(
            "SELECT id, owner_kind, owner_id, name, enabled, price, shipping_from_country, \
             pickup_available_in_weeks, override_warehouse \
             FROM incoterms WHERE owner_kind = $1 AND owner_id = $2",
        )
        .bind(owner.kind.to_string())
        .bind(owner.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IncotermRow::into_model).collect()
    }

    async fn load_country_rules(&self, owner: OwnerRef) -> Result<Vec<CountryRule>, BoxError> {
        let rows: Vec<CountryRow> = sqlx::query_as(
            "SELECT id, owner_kind, owner_id, country_code, delivery_allowed \
             FROM country_rules WHERE owner_kind = $1 AND owner_id = $2",
        )
        .bind(owner.kind.to_string())
        .bind(owner.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CountryRow::into_model).collect()
    }

    async fn load_details(&self, record: OfferRecord) -> Result<OfferDetails, BoxError> {
        let offer = record.offer;

        let price_rows: Vec<PriceRow> = sqlx::query_as(
            "SELECT id, offer_id, price, price_wp, qty_from, qty_to \
             FROM offer_prices WHERE offer_id = $1 ORDER BY qty_from NULLS FIRST",
        )
        .bind(offer.id)
        .fetch_all(&self.pool)
        .await?;

        let prices = price_rows
            .into_iter()
            .map(|row| PriceTier {
                id: row.id,
                offer_id: row.offer_id,
                price: row.price,
                price_wp: row.price_wp,
                qty_from: row.qty_from,
                qty_to: row.qty_to,
            })
            .collect();

        let incoterms = self.load_incoterms(OwnerRef::offer(offer.id)).await?;
        let warehouse_incoterms = self
            .load_incoterms(OwnerRef::warehouse(offer.warehouse_id))
            .await?;

        let countries = self.load_country_rules(OwnerRef::offer(offer.id)).await?;
        let warehouse_countries = self
            .load_country_rules(OwnerRef::warehouse(offer.warehouse_id))
            .await?;

        Ok(OfferDetails {
            offer,
            children: OfferChildren {
                prices,
                incoterms,
                countries,
            },
            product_name: record.product_name,
            warehouse_incoterms,
            warehouse_countries,
        })
    }

    /// Append the canonical bulk predicate to a builder whose query
    /// aliases offers as `o` and products as `p`.
    fn push_bulk_predicates<'a>(
        builder: &mut QueryBuilder<'a, Postgres>,
        business_id: Uuid,
        filter: &'a BulkFilter,
        guard: PublishGuard,
    ) {
        builder.push(" WHERE o.business_id = ").push_bind(business_id);

        if !filter.ids.is_empty() {
            builder.push(" AND o.id = ANY(").push_bind(filter.ids.clone()).push(")");
        }
        if let Some(status) = filter.status {
            builder.push(" AND o.status = ").push_bind(status.to_string());
        }
        if let Some(name) = &filter.name {
            builder.push(" AND o.name ILIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(product_name) = &filter.product_name {
            builder
                .push(" AND p.name ILIKE ")
                .push_bind(format!("%{product_name}%"));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            builder.push(" AND o.warehouse_id = ").push_bind(warehouse_id);
        }

        match guard {
            PublishGuard::None => {}
            PublishGuard::RequireUnpublished => {
                builder.push(" AND o.publish_at IS NULL");
            }
            PublishGuard::RequirePublished => {
                builder.push(" AND o.publish_at IS NOT NULL");
            }
        }
    }

}

#[async_trait]
impl OfferStore for PostgresOfferStore {
    async fn get(&self, id: Uuid) -> Result<Option<OfferDetails>, BoxError> {
        match self.fetch_record(id).await? {
            Some(record) => Ok(Some(self.load_details(record).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, offer: &Offer, children: Option<&OfferChildren>) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO offers (id, user_id, business_id, product_id, warehouse_id, promotion_id, \
             status, source, name, description, availability_quantity, min_order_quantity, \
             min_order_unit, price_display_unit, publish_at, expire_at, shipping_available_from, \
             lowest_price, exported_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21) \
             ON CONFLICT (id) DO UPDATE SET \
             warehouse_id = EXCLUDED.warehouse_id, promotion_id = EXCLUDED.promotion_id, \
             status = EXCLUDED.status, name = EXCLUDED.name, description = EXCLUDED.description, \
             availability_quantity = EXCLUDED.availability_quantity, \
             min_order_quantity = EXCLUDED.min_order_quantity, \
             min_order_unit = EXCLUDED.min_order_unit, \
             price_display_unit = EXCLUDED.price_display_unit, \
             publish_at = EXCLUDED.publish_at, expire_at = EXCLUDED.expire_at, \
             shipping_available_from = EXCLUDED.shipping_available_from, \
             lowest_price = EXCLUDED.lowest_price, exported_at = EXCLUDED.exported_at, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(offer.id)
        .bind(offer.user_id)
        .bind(offer.business_id)
        .bind(offer.product_id)
        .bind(offer.warehouse_id)
        .bind(offer.promotion_id)
        .bind(offer.status.to_string())
        .bind(offer.source.to_string())
        .bind(&offer.name)
        .bind(&offer.description)
        .bind(offer.availability_quantity)
        .bind(offer.min_order_quantity)
        .bind(offer.min_order_unit.to_string())
        .bind(offer.price_display_unit.to_string())
        .bind(offer.publish_at)
        .bind(offer.expire_at)
        .bind(offer.shipping_available_from)
        .bind(offer.lowest_price)
        .bind(offer.exported_at)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(children) = children {
            // Wholesale replacement: children never survive an update.
            sqlx::query("DELETE FROM offer_prices WHERE offer_id = $1")
                .bind(offer.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM incoterms WHERE owner_kind = $1 AND owner_id = $2")
                .bind(OwnerKind::Offer.to_string())
                .bind(offer.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM country_rules WHERE owner_kind = $1 AND owner_id = $2")
                .bind(OwnerKind::Offer.to_string())
                .bind(offer.id)
                .execute(&mut *tx)
                .await?;

            for tier in &children.prices {
                sqlx::query(
                    "INSERT INTO offer_prices (id, offer_id, price, price_wp, qty_from, qty_to) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(tier.id)
                .bind(tier.offer_id)
                .bind(tier.price)
                .bind(tier.price_wp)
                .bind(tier.qty_from)
                .bind(tier.qty_to)
                .execute(&mut *tx)
                .await?;
            }

            for term in &children.incoterms {
                sqlx::query(
                    "INSERT INTO incoterms (id, owner_kind, owner_id, name, enabled, price, \
                     shipping_from_country, pickup_available_in_weeks, override_warehouse) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(term.id)
                .bind(term.owner.kind.to_string())
                .bind(term.owner.id)
                .bind(term.name.to_string())
                .bind(term.enabled)
                .bind(term.price)
                .bind(&term.shipping_from_country)
                .bind(term.pickup_available_in_weeks)
                .bind(term.override_warehouse)
                .execute(&mut *tx)
                .await?;
            }

            for rule in &children.countries {
                sqlx::query(
                    "INSERT INTO country_rules (id, owner_kind, owner_id, country_code, \
                     delivery_allowed) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(rule.id)
                .bind(rule.owner.kind.to_string())
                .bind(rule.owner.id)
                .bind(&rule.country_code)
                .bind(rule.delivery_allowed)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BoxError> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        scope: Option<Uuid>,
        query: &OfferListQuery,
    ) -> Result<Vec<OfferRecord>, BoxError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {OFFER_COLUMNS} {OFFER_FROM} WHERE 1=1"));

        if let Some(business_id) = scope {
            builder.push(" AND o.business_id = ").push_bind(business_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND o.status = ").push_bind(status.to_string());
        }
        if let Some(term) = &query.term {
            builder.push(" AND (p.name ILIKE ").push_bind(format!("%{term}%"));
            // A term that parses as a UUID also matches the offer id.
            if let Ok(id) = term.parse::<Uuid>() {
                builder.push(" OR o.id = ").push_bind(id);
            }
            builder.push(")");
        }

        push_order_and_page(&mut builder, query);

        let rows: Vec<OfferRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(OfferRow::into_record).collect()
    }

    async fn search(&self, query: &OfferListQuery) -> Result<Vec<OfferRecord>, BoxError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {OFFER_COLUMNS} {OFFER_FROM} WHERE o.status = "
        ));
        builder.push_bind(OfferStatus::Active.to_string());

        if let Some(term) = &query.term {
            let pattern = format!("%{term}%");
            builder
                .push(" AND (o.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        push_order_and_page(&mut builder, query);

        let rows: Vec<OfferRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(OfferRow::into_record).collect()
    }

    async fn counters(&self, scope: Option<Uuid>) -> Result<Vec<(OfferStatus, i64)>, BoxError> {
        let rows: Vec<(String, i64)> = match scope {
            Some(business_id) => {
                sqlx::query_as(
                    "SELECT status, COUNT(*) FROM offers WHERE business_id = $1 GROUP BY status",
                )
                .bind(business_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT status, COUNT(*) FROM offers GROUP BY status")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(|(status, count)| Ok((status.parse().map_err(BoxError::from)?, count)))
            .collect()
    }

    async fn update_status_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        target: OfferStatus,
        guard: PublishGuard,
    ) -> Result<Vec<OfferRecord>, BoxError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE offers SET status = ");
        builder.push_bind(target.to_string());
        builder.push(", updated_at = now() WHERE id IN (SELECT o.id ");
        builder.push(OFFER_FROM);
        Self::push_bulk_predicates(&mut builder, business_id, filter, guard);
        builder.push(") RETURNING id");

        let ids: Vec<(Uuid,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = ids.into_iter().map(|(id,)| id).collect();
        let rows: Vec<OfferRow> =
            sqlx::query_as(&format!("SELECT {OFFER_COLUMNS} {OFFER_FROM} WHERE o.id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(OfferRow::into_record).collect()
    }

    async fn delete_bulk(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        guard: PublishGuard,
    ) -> Result<Vec<Uuid>, BoxError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("DELETE FROM offers WHERE id IN (SELECT o.id ");
        builder.push(OFFER_FROM);
        Self::push_bulk_predicates(&mut builder, business_id, filter, guard);
        builder.push(") RETURNING id");

        let ids: Vec<(Uuid,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn export_candidates(
        &self,
        business_id: Uuid,
        filter: &BulkFilter,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OfferDetails>, BoxError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {OFFER_COLUMNS} {OFFER_FROM}"));
        Self::push_bulk_predicates(&mut builder, business_id, filter, PublishGuard::None);
        builder.push(" AND o.created_at > ").push_bind(cutoff);
        builder.push(" ORDER BY o.created_at DESC LIMIT ").push_bind(limit);

        let rows: Vec<OfferRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            details.push(self.load_details(row.into_record()?).await?);
        }
        Ok(details)
    }

    async fn mark_exported(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<(), BoxError> {
        sqlx::query("UPDATE offers SET exported_at = $1 WHERE id = ANY($2)")
            .bind(at)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_view(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        sqlx::query(
            "INSERT INTO offer_views (id, user_id, offer_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(offer_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn viewed_offers(
        &self,
        user_id: Uuid,
        query: &PageQuery,
    ) -> Result<Vec<ViewedOffer>, BoxError> {
        let views: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT offer_id, created_at FROM offer_views WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        let mut viewed = Vec::with_capacity(views.len());
        for (offer_id, viewed_at) in views {
            if let Some(record) = self.fetch_record(offer_id).await? {
                viewed.push(ViewedOffer {
                    offer: record.offer,
                    product_name: record.product_name,
                    viewed_at,
                });
            }
        }
        Ok(viewed)
    }
}

fn push_order_and_page(builder: &mut QueryBuilder<'_, Postgres>, query: &OfferListQuery) {
    // Sort columns come from a whitelist, never from raw input.
    let column = query
        .sort_by
        .map(|field| field.as_column())
        .unwrap_or("created_at");
    let direction = if query.descending { "DESC" } else { "ASC" };
    builder.push(format!(" ORDER BY o.{column} {direction}"));
    builder.push(" LIMIT ").push_bind(query.limit());
    builder.push(" OFFSET ").push_bind(query.offset());
}
