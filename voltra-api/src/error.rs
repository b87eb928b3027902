use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use voltra_offer::OfferError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Maps domain errors onto HTTP statuses. Storage failures never leak
    /// their message to the client.
    pub fn offer(err: OfferError) -> Self {
        match err {
            OfferError::Validation(msg) => Self::ValidationError(msg),
            OfferError::WpNotSupported => {
                Self::ValidationError("product does not support watt-peak pricing".to_string())
            }
            OfferError::NotFound(id) => Self::NotFoundError(format!("offer not found: {id}")),
            OfferError::ProductNotFound(id) => {
                Self::NotFoundError(format!("product not found: {id}"))
            }
            OfferError::Forbidden(msg) => Self::AuthorizationError(msg),
            OfferError::Store(err) => Self::InternalServerError(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
