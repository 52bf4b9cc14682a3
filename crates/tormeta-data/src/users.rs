//! User accounts and access tokens.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::{DataError, Result};

const INSERT_USER: &str = r"
    INSERT INTO users (username, email, password_hash, is_active, is_admin, created_at)
    VALUES (?1, ?2, ?3, 1, ?4, ?5)
    RETURNING id, username, email, password_hash, is_active, is_admin, created_at
";

const SELECT_USER_BY_USERNAME: &str = r"
    SELECT id, username, email, password_hash, is_active, is_admin, created_at
    FROM users
    WHERE username = ?1
";

const SELECT_USER_BY_ID: &str = r"
    SELECT id, username, email, password_hash, is_active, is_admin, created_at
    FROM users
    WHERE id = ?1
";

const COUNT_USERS: &str = r"SELECT COUNT(*) FROM users";

const INSERT_TOKEN: &str = r"
    INSERT INTO access_tokens (token_id, user_id, secret_hash, expires_at, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
";

const SELECT_TOKEN: &str = r"
    SELECT token_id, user_id, secret_hash, expires_at, created_at
    FROM access_tokens
    WHERE token_id = ?1
";

const DELETE_EXPIRED_TOKENS: &str = r"DELETE FROM access_tokens WHERE expires_at <= ?1";

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Optional contact address.
    pub email: Option<String>,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Disabled accounts cannot log in.
    pub is_active: bool,
    /// Administrative flag.
    pub is_admin: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    /// Unique login name.
    pub username: &'a str,
    /// Optional contact address.
    pub email: Option<&'a str>,
    /// Argon2 PHC string.
    pub password_hash: &'a str,
    /// Administrative flag.
    pub is_admin: bool,
}

/// Stored access token; the secret itself is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccessTokenRecord {
    /// Public token identifier.
    pub token_id: String,
    /// Owning user.
    pub user_id: i64,
    /// Argon2 hash of the secret half.
    pub secret_hash: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Issue instant.
    pub created_at: DateTime<Utc>,
}

/// Repository for users and access tokens.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    /// Wrap an already migrated pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Conflict`] if the username is taken.
    pub async fn create_user(&self, user: NewUser<'_>) -> Result<UserRecord> {
        sqlx::query_as::<_, UserRecord>(INSERT_USER)
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.is_admin)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| DataError::unique("users.create", "username", err))
    }

    /// Look up a user by login name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(SELECT_USER_BY_USERNAME)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| DataError::query("users.find_by_username", err))
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_user(&self, id: i64) -> Result<Option<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(SELECT_USER_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| DataError::query("users.get", err))
    }

    /// Number of registered users.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(COUNT_USERS)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| DataError::query("users.count", err))
    }

    /// Persist an issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_token(&self, token: &AccessTokenRecord) -> Result<()> {
        sqlx::query(INSERT_TOKEN)
            .bind(&token.token_id)
            .bind(token.user_id)
            .bind(&token.secret_hash)
            .bind(token.expires_at)
            .bind(token.created_at)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| DataError::unique("tokens.insert", "token_id", err))
    }

    /// Fetch a token by its public identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_token(&self, token_id: &str) -> Result<Option<AccessTokenRecord>> {
        sqlx::query_as::<_, AccessTokenRecord>(SELECT_TOKEN)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| DataError::query("tokens.find", err))
    }

    /// Remove tokens that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        sqlx::query(DELETE_EXPIRED_TOKENS)
            .bind(now)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
            .map_err(|err| DataError::query("tokens.delete_expired", err))
    }
}
