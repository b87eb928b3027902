use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voltra_core::identity::{Actor, Permission};
use voltra_offer::dto::{BulkFilter, OfferListQuery, PageQuery};
use voltra_offer::models::{Offer, OfferDetails, OfferRecord, OfferStatus, ViewedOffer};

use crate::{error::AppError, middleware::auth::AuthSeller, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OfferStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub filter: BulkFilter,
    pub status: OfferStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub filter: BulkFilter,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub ids: Vec<Uuid>,
    pub input: voltra_offer::OfferInput,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub affected: u64,
}

#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub status: OfferStatus,
    pub count: i64,
}

fn require_seller(actor: &Actor) -> Result<(), AppError> {
    if actor.has(Permission::Sell) || actor.has(Permission::AdminOffers) {
        Ok(())
    } else {
        Err(AppError::AuthorizationError(
            "selling permission required".to_string(),
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/offers
/// Offers of the caller's business; admins see every business.
pub async fn list(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Query(query): Query<OfferListQuery>,
) -> Result<Json<Vec<OfferRecord>>, AppError> {
    let records = state
        .offers
        .list(&actor, &query)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(records))
}

/// GET /v1/offers/search
/// Public marketplace search over active offers.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<OfferListQuery>,
) -> Result<Json<Vec<OfferRecord>>, AppError> {
    let records = state
        .offers
        .search(&query)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(records))
}

/// GET /v1/offers/counters
pub async fn counters(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
) -> Result<Json<Vec<CounterResponse>>, AppError> {
    let counts = state
        .offers
        .counters(&actor)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(
        counts
            .into_iter()
            .map(|(status, count)| CounterResponse { status, count })
            .collect(),
    ))
}

/// GET /v1/offers/viewed
/// The caller's recently viewed offers, newest first.
pub async fn viewed(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ViewedOffer>>, AppError> {
    let viewed = state
        .offers
        .viewed_offers(&actor, &query)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(viewed))
}

/// GET /v1/offers/{id}
/// Public offer details. Authenticated callers get the visit recorded in
/// their view history.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Option<Extension<Actor>>,
) -> Result<Json<OfferDetails>, AppError> {
    let actor = actor.map(|Extension(a)| a);
    let details = state
        .offers
        .details(actor.as_ref(), id)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(details))
}

/// POST /v1/products/{product_id}/offers
pub async fn create(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Path(product_id): Path<Uuid>,
    Json(input): Json<voltra_offer::OfferInput>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    require_seller(&actor)?;
    let offer = state
        .offers
        .create(&actor, product_id, input)
        .await
        .map_err(AppError::offer)?;
    state.metrics.offers_created.inc();
    Ok((StatusCode::CREATED, Json(offer)))
}

/// PUT /v1/offers/{id}
pub async fn update(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Path(id): Path<Uuid>,
    Json(input): Json<voltra_offer::OfferInput>,
) -> Result<Json<Offer>, AppError> {
    require_seller(&actor)?;
    let offer = state
        .offers
        .update(&actor, id, input)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(offer))
}

/// PATCH /v1/offers/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Offer>, AppError> {
    require_seller(&actor)?;
    let offer = state
        .offers
        .update_status(&actor, id, req.status)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(offer))
}

/// POST /v1/offers/{id}/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    require_seller(&actor)?;
    let copy = state
        .offers
        .duplicate(&actor, id)
        .await
        .map_err(AppError::offer)?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// DELETE /v1/offers/{id}
pub async fn remove(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_seller(&actor)?;
    state
        .offers
        .delete(&actor, id)
        .await
        .map_err(AppError::offer)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/offers/bulk/status
pub async fn bulk_status(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    require_seller(&actor)?;
    let affected = state
        .offers
        .update_bulk_status(&actor, &req.filter, req.status)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(BulkResponse { affected }))
}

/// POST /v1/offers/bulk/update
/// Per-offer full update; items that fail are skipped, not fatal.
pub async fn bulk_update(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    require_seller(&actor)?;
    let updated = state.offers.update_bulk(&actor, &req.ids, &req.input).await;
    Ok(Json(BulkResponse {
        affected: updated.len() as u64,
    }))
}

/// POST /v1/offers/bulk/delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    require_seller(&actor)?;
    let affected = state
        .offers
        .delete_bulk(&actor, &req.filter)
        .await
        .map_err(AppError::offer)?;
    Ok(Json(BulkResponse { affected }))
}
