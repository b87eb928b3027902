use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voltra_core::identity::{Actor, Permission};

use crate::{error::AppError, state::AppState};

/// Claims issued by the identity platform for seller accounts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SellerClaims {
    pub sub: Uuid,
    pub business_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: usize,
}

impl SellerClaims {
    /// Unknown permission strings are dropped rather than rejected, so new
    /// platform permissions do not break older deployments.
    pub fn actor(&self) -> Actor {
        let permissions = self
            .permissions
            .iter()
            .filter_map(|p| Permission::parse(p))
            .collect();
        Actor::new(self.sub, self.business_id, permissions)
    }
}

fn decode_actor(state: &AppState, req: &Request) -> Option<Actor> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())?;
    let token = auth_header.strip_prefix("Bearer ")?;

    let token_data = decode::<SellerClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(token_data.claims.actor())
}

/// Decodes the bearer token when one is present and injects the [`Actor`]
/// into request extensions. Missing or invalid tokens pass through
/// anonymously; handlers that need identity require it via [`AuthSeller`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(actor) = decode_actor(&state, &req) {
        req.extensions_mut().insert(actor);
    }
    next.run(req).await
}

/// Extractor for handlers that refuse anonymous callers.
pub struct AuthSeller(pub Actor);

impl<S> FromRequestParts<S> for AuthSeller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthSeller)
            .ok_or_else(|| {
                AppError::AuthenticationError("missing or invalid bearer token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn claims_round_trip_and_map_to_actor() {
        let claims = SellerClaims {
            sub: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            role: "SELLER".to_string(),
            permissions: vec!["SELL".to_string(), "SOMETHING_NEW".to_string()],
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };

        let secret = b"test-secret";
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();
        let decoded = decode::<SellerClaims>(
            &token,
            &DecodingKey::from_secret(secret),
            &Validation::default(),
        )
        .unwrap();

        let actor = decoded.claims.actor();
        assert_eq!(actor.user_id, claims.sub);
        assert_eq!(actor.business_id, claims.business_id);
        assert_eq!(actor.permissions, vec![Permission::Sell]);
    }
}
