use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use parley_types::UserId;
use parley_types::error::ChatError;
use parley_types::token::TokenVerifier;

use crate::error::ApiError;

/// Normalized authenticated identity. Handlers consume only the user id and
/// never learn (or branch on) how the caller authenticated.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: UserId,
}

/// Extract and validate the bearer token from the Authorization header,
/// attaching a `Principal` extension for downstream handlers.
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ChatError::Unauthenticated)?;

    let claims = verifier.verify(token)?;

    req.extensions_mut().insert(Principal {
        user_id: claims.sub,
    });
    Ok(next.run(req).await)
}
