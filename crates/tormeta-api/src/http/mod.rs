//! HTTP surface modules (router, middleware, handlers).

/// Account registration and login handlers.
pub(crate) mod accounts;
/// Bearer authentication middleware.
pub(crate) mod auth;
/// Shared constants and header names.
pub(crate) mod constants;
/// Problem response helpers.
pub(crate) mod errors;
/// Liveness, health, and metrics endpoints.
pub(crate) mod health;
/// WebSocket live feed.
pub(crate) mod live;
/// Router construction and server host.
pub(crate) mod router;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
/// Torrent record handlers and ingest.
pub(crate) mod torrents;
