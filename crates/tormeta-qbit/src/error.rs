//! Failures raised while talking to qBittorrent.

use thiserror::Error;

/// Transport-level errors surfaced as the source of daemon failures.
#[derive(Debug, Error)]
pub enum QbitError {
    /// The HTTP client could not be constructed.
    #[error("failed to build daemon http client")]
    ClientBuild {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// An endpoint URL could not be derived from the configured host.
    #[error("invalid daemon endpoint")]
    Endpoint {
        /// Relative API path.
        path: &'static str,
        /// Underlying parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The request did not complete (connect failure, reset, timeout).
    #[error("daemon request failed")]
    Transport {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The daemon refused the session cookie.
    #[error("daemon refused session")]
    Unauthorized {
        /// HTTP status returned.
        status: u16,
    },
    /// The daemon refused the configured credentials.
    #[error("daemon login rejected")]
    LoginRejected,
    /// Login succeeded without issuing a session cookie.
    #[error("daemon login returned no session cookie")]
    MissingSessionCookie,
    /// A response body could not be decoded.
    #[error("failed to decode daemon response")]
    Decode {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// A local metainfo file could not be read for upload.
    #[error("failed to read metainfo file")]
    ReadFile {
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
}
