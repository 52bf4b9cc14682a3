//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tormeta_config::ConfigError;
use tormeta_torrent_core::TorrentError;
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_GATEWAY, PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
    PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_UNAUTHORIZED,
};

/// Problem document body.
#[derive(Debug, Serialize)]
pub(crate) struct ProblemDetails {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_BAD_GATEWAY,
            "transfer daemon error",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    /// Map a domain failure onto a problem response, logging server-side faults.
    pub(crate) fn from_torrent(err: &TorrentError, context: &'static str) -> Self {
        match err {
            TorrentError::NotFound { .. } => Self::not_found("torrent not found"),
            TorrentError::DaemonUnavailable { .. } | TorrentError::DaemonRejected { .. } => {
                warn!(error = %err, "{context}");
                Self::bad_gateway(err.to_string())
            }
            TorrentError::MalformedInput { field, reason } => {
                Self::bad_request(format!("{field}: {reason}"))
            }
            TorrentError::InvalidInfoHash { .. } | TorrentError::InvalidSource { .. } => {
                Self::bad_request(err.to_string())
            }
            TorrentError::Store { .. } | TorrentError::ResolutionTimeout { .. } => {
                error!(error = %err, "{context}");
                Self::internal(context)
            }
        }
    }

    /// Map an account failure onto a problem response.
    pub(crate) fn from_identity(err: &ConfigError, context: &'static str) -> Self {
        match err {
            ConfigError::InvalidRegistration { field, reason } => {
                Self::bad_request(format!("{field}: {reason}"))
            }
            ConfigError::UsernameTaken { .. } => Self::bad_request("username already registered"),
            ConfigError::InvalidCredentials => {
                Self::unauthorized("incorrect username or password")
            }
            ConfigError::TokenInvalid | ConfigError::TokenExpired => {
                Self::unauthorized(err.to_string())
            }
            ConfigError::InvalidField { .. }
            | ConfigError::SecretHashFailed { .. }
            | ConfigError::StoredHashInvalid { .. }
            | ConfigError::SecretVerifyFailed { .. }
            | ConfigError::DataAccess { .. } => {
                error!(error = %err, "{context}");
                Self::internal(context)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn torrent_errors_map_to_statuses() {
        let cases = [
            (
                TorrentError::NotFound { record_id: 1 },
                StatusCode::NOT_FOUND,
            ),
            (
                TorrentError::daemon_unavailable("list", io::Error::other("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TorrentError::DaemonRejected {
                    operation: "pause",
                    status: 500,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                TorrentError::InvalidSource { reason: "empty" },
                StatusCode::BAD_REQUEST,
            ),
            (
                TorrentError::store("get", io::Error::other("locked")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_torrent(&err, "ctx").status, status);
        }
    }

    #[test]
    fn identity_errors_do_not_leak_which_credential_failed() {
        let bad = ApiError::from_identity(&ConfigError::InvalidCredentials, "login");
        assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
        assert_eq!(bad.kind, PROBLEM_UNAUTHORIZED);
        let taken = ApiError::from_identity(
            &ConfigError::UsernameTaken {
                username: "alice".into(),
            },
            "register",
        );
        assert_eq!(taken.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn problem_body_uses_type_field() -> Result<(), serde_json::Error> {
        let body = ProblemDetails {
            kind: PROBLEM_NOT_FOUND.to_string(),
            title: "resource not found".to_string(),
            status: 404,
            detail: None,
        };
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["type"], PROBLEM_NOT_FOUND);
        assert!(value.get("detail").is_none());
        Ok(())
    }
}
