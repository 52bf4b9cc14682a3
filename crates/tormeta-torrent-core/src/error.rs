//! Error types for torrent metadata and daemon operations.

use std::error::Error;

use thiserror::Error;

/// Boxed source error carried across crate boundaries.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The daemon could not be reached or refused authentication after a session rebuild.
    #[error("transfer daemon unavailable")]
    DaemonUnavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// The daemon answered with a non-success status unrelated to authentication.
    #[error("transfer daemon rejected request")]
    DaemonRejected {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status returned by the daemon.
        status: u16,
    },
    /// Hash resolution exhausted its retry budget.
    #[error("transfer hash resolution timed out")]
    ResolutionTimeout {
        /// Record awaiting a hash.
        record_id: i64,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The persistence collaborator failed.
    #[error("torrent store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Caller supplied input that could not be interpreted.
    #[error("malformed input")]
    MalformedInput {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Value was not a canonical info-hash.
    #[error("invalid info-hash")]
    InvalidInfoHash {
        /// Offending value.
        value: String,
    },
    /// Transfer source was not a magnet, URL, or metainfo file.
    #[error("invalid transfer source")]
    InvalidSource {
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Torrent record was not found.
    #[error("torrent record not found")]
    NotFound {
        /// Missing record identifier.
        record_id: i64,
    },
}

impl TorrentError {
    /// Wrap a persistence failure.
    pub fn store(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Store {
            operation,
            source: source.into(),
        }
    }

    /// Wrap a daemon connectivity failure.
    pub fn daemon_unavailable(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::DaemonUnavailable {
            operation,
            source: source.into(),
        }
    }

    /// Whether the error originated from the transfer daemon.
    #[must_use]
    pub const fn is_daemon(&self) -> bool {
        matches!(
            self,
            Self::DaemonUnavailable { .. } | Self::DaemonRejected { .. }
        )
    }
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn torrent_error_display_and_source() {
        let cases: Vec<(TorrentError, &str, bool)> = vec![
            (
                TorrentError::daemon_unavailable("list", io::Error::other("refused")),
                "transfer daemon unavailable",
                true,
            ),
            (
                TorrentError::DaemonRejected {
                    operation: "add",
                    status: 415,
                },
                "transfer daemon rejected request",
                false,
            ),
            (
                TorrentError::ResolutionTimeout {
                    record_id: 3,
                    attempts: 10,
                },
                "transfer hash resolution timed out",
                false,
            ),
            (
                TorrentError::store("create", io::Error::other("disk")),
                "torrent store operation failed",
                true,
            ),
            (
                TorrentError::MalformedInput {
                    field: "custom_metadata",
                    reason: "not_an_object",
                },
                "malformed input",
                false,
            ),
            (
                TorrentError::InvalidInfoHash {
                    value: "zz".to_string(),
                },
                "invalid info-hash",
                false,
            ),
            (
                TorrentError::InvalidSource { reason: "empty" },
                "invalid transfer source",
                false,
            ),
            (
                TorrentError::NotFound { record_id: 9 },
                "torrent record not found",
                false,
            ),
        ];

        for (err, message, has_source) in cases {
            assert_eq!(err.to_string(), message);
            assert_eq!(err.source().is_some(), has_source);
        }
    }

    #[test]
    fn daemon_errors_are_classified() {
        assert!(TorrentError::DaemonRejected {
            operation: "pause",
            status: 500
        }
        .is_daemon());
        assert!(!TorrentError::NotFound { record_id: 1 }.is_daemon());
    }
}
