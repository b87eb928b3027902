use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod export;
pub mod metrics;
pub mod middleware;
pub mod offers;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/v1/offers", get(offers::list))
        .route("/v1/offers/search", get(offers::search))
        .route("/v1/offers/counters", get(offers::counters))
        .route("/v1/offers/viewed", get(offers::viewed))
        .route(
            "/v1/offers/{id}",
            get(offers::show).put(offers::update).delete(offers::remove),
        )
        .route("/v1/offers/{id}/status", axum::routing::patch(offers::update_status))
        .route("/v1/offers/{id}/duplicate", post(offers::duplicate))
        .route("/v1/offers/bulk/status", post(offers::bulk_status))
        .route("/v1/offers/bulk/update", post(offers::bulk_update))
        .route("/v1/offers/bulk/delete", post(offers::bulk_delete))
        .route("/v1/offers/export", post(export::export))
        .route("/v1/products/{product_id}/offers", post(offers::create))
        .route("/metrics", get(metrics::metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state)
}
