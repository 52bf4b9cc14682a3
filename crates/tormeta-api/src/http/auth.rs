//! Bearer token middleware for the HTTP layer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::http::constants::BEARER_PREFIX;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Caller identity attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthContext {
    pub(crate) user_id: i64,
    pub(crate) username: String,
}

pub(crate) async fn require_bearer(
    State(state): State<Arc<ApiState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)?;
    let context = authenticate(&state, &token).await?;
    debug!(user_id = context.user_id, "bearer token accepted");
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Resolve a presented token to the caller, shared by the middleware and the
/// WebSocket handshake.
pub(crate) async fn authenticate(state: &ApiState, token: &str) -> Result<AuthContext, ApiError> {
    let identity = state
        .identity
        .verify_token(token)
        .await
        .map_err(|err| ApiError::from_identity(&err, "failed to verify access token"))?;
    Ok(AuthContext {
        user_id: identity.user_id,
        username: identity.username,
    })
}

fn bearer_token<B>(req: &Request<B>) -> Result<String, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("authorization header must be valid UTF-8"))?;
    let token = value
        .split_at_checked(BEARER_PREFIX.len())
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case(BEARER_PREFIX))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("authorization scheme must be Bearer"))?;
    Ok(token.to_string())
}
