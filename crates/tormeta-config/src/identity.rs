//! Account registration, login, and bearer token verification.
//!
//! # Design
//! - Passwords and token secrets are stored only as argon2 PHC strings.
//! - Tokens have the shape `<token_id>.<secret>`; the identifier selects the
//!   stored row and the secret is verified against its hash.
//! - Every rejection of a presented credential maps to one of two opaque
//!   errors so callers cannot probe which part was wrong.

use chrono::{DateTime, Utc};
use tormeta_data::{AccessTokenRecord, DataError, NewUser, UserRecord, UserStore};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::model::AuthConfig;
use crate::secrets::{generate_token, hash_secret, verify_secret};

const TOKEN_ID_LEN: usize = 16;
const TOKEN_SECRET_LEN: usize = 32;
const MAX_USERNAME_LEN: usize = 64;
const TOKEN_TYPE: &str = "bearer";

/// Registration payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Requested login name.
    pub username: String,
    /// Optional contact address.
    pub email: Option<String>,
    /// Plain-text password.
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: Option<String>,
    /// Whether the account may log in.
    pub is_active: bool,
    /// Administrative flag.
    pub is_admin: bool,
}

impl From<UserRecord> for Account {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            is_admin: user.is_admin,
        }
    }
}

/// Freshly issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Value for the `Authorization: Bearer` header or `token` query parameter.
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: &'static str,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Caller identity established from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account identifier.
    pub user_id: i64,
    /// Login name.
    pub username: String,
}

/// Registration, login, and token checks backed by [`UserStore`].
#[derive(Clone)]
pub struct IdentityService {
    users: UserStore,
    token_ttl: chrono::Duration,
}

impl IdentityService {
    /// Build the service.
    #[must_use]
    pub const fn new(users: UserStore, auth: AuthConfig) -> Self {
        Self {
            users,
            token_ttl: auth.token_ttl,
        }
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegistration`] for an unusable payload and
    /// [`ConfigError::UsernameTaken`] when the name already exists.
    pub async fn register(&self, registration: Registration) -> ConfigResult<Account> {
        let username = registration.username.trim();
        validate_username(username)?;
        if registration.password.is_empty() {
            return Err(ConfigError::InvalidRegistration {
                field: "password",
                reason: "empty",
            });
        }
        let email = registration
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty());
        if email.is_some_and(|email| !email.contains('@')) {
            return Err(ConfigError::InvalidRegistration {
                field: "email",
                reason: "malformed",
            });
        }

        let password_hash = hash_secret(&registration.password)?;
        let user = self
            .users
            .create_user(NewUser {
                username,
                email,
                password_hash: &password_hash,
                is_admin: false,
            })
            .await
            .map_err(|source| match source {
                DataError::Conflict { .. } => ConfigError::UsernameTaken {
                    username: username.to_string(),
                },
                source => ConfigError::DataAccess {
                    operation: "identity.register",
                    source,
                },
            })?;
        info!(user_id = user.id, username = %user.username, "account registered");
        Ok(user.into())
    }

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCredentials`] when the name is unknown, the
    /// account is disabled, or the password does not match.
    pub async fn login(&self, username: &str, password: &str) -> ConfigResult<IssuedToken> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await
            .map_err(data_access("identity.login"))?
            .filter(|user| user.is_active)
            .ok_or(ConfigError::InvalidCredentials)?;
        if !verify_secret(&user.password_hash, password)? {
            return Err(ConfigError::InvalidCredentials);
        }

        let now = Utc::now();
        if let Err(err) = self.users.delete_expired_tokens(now).await {
            warn!(error = %err, "failed to purge expired access tokens");
        }

        let token_id = generate_token(TOKEN_ID_LEN);
        let secret = generate_token(TOKEN_SECRET_LEN);
        let expires_at = now + self.token_ttl;
        self.users
            .insert_token(&AccessTokenRecord {
                token_id: token_id.clone(),
                user_id: user.id,
                secret_hash: hash_secret(&secret)?,
                expires_at,
                created_at: now,
            })
            .await
            .map_err(data_access("identity.issue_token"))?;

        info!(user_id = user.id, "access token issued");
        Ok(IssuedToken {
            access_token: format!("{token_id}.{secret}"),
            token_type: TOKEN_TYPE,
            expires_at,
        })
    }

    /// Resolve a presented bearer token to the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TokenInvalid`] or [`ConfigError::TokenExpired`]
    /// when the token cannot be accepted.
    pub async fn verify_token(&self, token: &str) -> ConfigResult<Identity> {
        let (token_id, secret) = token
            .trim()
            .split_once('.')
            .filter(|(id, secret)| !id.is_empty() && !secret.is_empty())
            .ok_or(ConfigError::TokenInvalid)?;
        let stored = self
            .users
            .find_token(token_id)
            .await
            .map_err(data_access("identity.find_token"))?
            .ok_or(ConfigError::TokenInvalid)?;
        if stored.expires_at <= Utc::now() {
            return Err(ConfigError::TokenExpired);
        }
        if !verify_secret(&stored.secret_hash, secret)? {
            return Err(ConfigError::TokenInvalid);
        }
        let user = self
            .users
            .get_user(stored.user_id)
            .await
            .map_err(data_access("identity.get_user"))?
            .filter(|user| user.is_active)
            .ok_or(ConfigError::TokenInvalid)?;
        Ok(Identity {
            user_id: user.id,
            username: user.username,
        })
    }
}

fn validate_username(username: &str) -> ConfigResult<()> {
    let reason = if username.is_empty() {
        Some("empty")
    } else if username.chars().count() > MAX_USERNAME_LEN {
        Some("too_long")
    } else if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '@'))
    {
        Some("invalid_characters")
    } else {
        None
    };
    reason.map_or(Ok(()), |reason| {
        Err(ConfigError::InvalidRegistration {
            field: "username",
            reason,
        })
    })
}

fn data_access(operation: &'static str) -> impl FnOnce(DataError) -> ConfigError {
    move |source| ConfigError::DataAccess { operation, source }
}
