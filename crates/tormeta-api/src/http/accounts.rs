//! Account registration and token issuance.

use std::sync::Arc;

use axum::{Form, Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tormeta_config::{Account, IssuedToken, Registration};
use tracing::info;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserOut {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) is_admin: bool,
}

impl From<Account> for UserOut {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            is_active: account.is_active,
            is_admin: account.is_admin,
        }
    }
}

/// OAuth2 password-grant style form.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_at: token.expires_at,
        }
    }
}

pub(crate) async fn register(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserOut>, ApiError> {
    let email = request.email.filter(|email| !email.trim().is_empty());
    let account = state
        .identity
        .register(Registration {
            username: request.username,
            email,
            password: request.password,
        })
        .await
        .map_err(|err| ApiError::from_identity(&err, "failed to register account"))?;
    info!(user_id = account.id, username = %account.username, "account registered");
    Ok(Json(account.into()))
}

pub(crate) async fn login(
    State(state): State<Arc<ApiState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state
        .identity
        .login(&form.username, &form.password)
        .await
        .map_err(|err| ApiError::from_identity(&err, "failed to log in"))?;
    Ok(Json(token.into()))
}
