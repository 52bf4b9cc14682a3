//! Error types for configuration and identity operations.

use argon2::password_hash::Error as PasswordHashError;
use thiserror::Error;

/// Primary error type for configuration and identity operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Environment key that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Registration payload was rejected.
    #[error("invalid registration")]
    InvalidRegistration {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Username already exists.
    #[error("username already exists")]
    UsernameTaken {
        /// Requested username.
        username: String,
    },
    /// Username/password pair did not match an active account.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Bearer token was malformed, unknown, or its secret did not match.
    #[error("invalid access token")]
    TokenInvalid,
    /// Bearer token is past its expiry.
    #[error("access token expired")]
    TokenExpired,
    /// Failed to hash secret material.
    #[error("failed to hash secret material")]
    SecretHashFailed {
        /// Hashing error detail.
        detail: PasswordHashError,
    },
    /// Stored secret hash payload was invalid.
    #[error("invalid stored hash")]
    StoredHashInvalid {
        /// Hash parsing error detail.
        detail: PasswordHashError,
    },
    /// Secret verification failed.
    #[error("failed to verify secret")]
    SecretVerifyFailed {
        /// Verification error detail.
        detail: PasswordHashError,
    },
    /// Data layer operation failed.
    #[error("data access failed")]
    DataAccess {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        #[source]
        source: tormeta_data::DataError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        value: Option<&str>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value: value.map(str::to_string),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn config_error_messages_are_constant() {
        let invalid = ConfigError::invalid("http", "TORMETA_BIND_ADDR", Some("nope"), "unparseable");
        assert_eq!(invalid.to_string(), "invalid configuration field");
        assert!(matches!(
            invalid,
            ConfigError::InvalidField {
                value: Some(ref value),
                ..
            } if value == "nope"
        ));

        assert_eq!(ConfigError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(ConfigError::TokenExpired.to_string(), "access token expired");
        assert_eq!(
            ConfigError::UsernameTaken {
                username: "alice".into()
            }
            .to_string(),
            "username already exists"
        );

        let data = ConfigError::DataAccess {
            operation: "users.create",
            source: tormeta_data::DataError::Conflict {
                operation: "users.create",
                field: "username",
            },
        };
        assert_eq!(data.to_string(), "data access failed");
        assert!(data.source().is_some());
    }
}
