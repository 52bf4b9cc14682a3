//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tormeta_config::ConfigError,
    },
    /// Opening or migrating the database failed.
    #[error("data operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: tormeta_data::DataError,
    },
    /// The daemon client could not be constructed.
    #[error("daemon client operation failed")]
    Daemon {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: tormeta_qbit::QbitError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tormeta_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tormeta_telemetry::TelemetryError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tormeta_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: tormeta_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn daemon(operation: &'static str, source: tormeta_qbit::QbitError) -> Self {
        Self::Daemon { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tormeta_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tormeta_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
