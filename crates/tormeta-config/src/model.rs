//! Typed runtime settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listener and upload settings.
    pub http: HttpConfig,
    /// Persistence settings.
    pub database: DatabaseConfig,
    /// Transfer daemon connection settings.
    pub daemon: DaemonConfig,
    /// Live feed cadence settings.
    pub broadcast: BroadcastConfig,
    /// Access token policy.
    pub auth: AuthConfig,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// HTTP listener and upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Socket the API binds to.
    pub bind_addr: SocketAddr,
    /// Directory receiving uploaded metainfo files.
    pub upload_dir: PathBuf,
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `sqlx` connection URL.
    pub url: String,
}

/// Transfer daemon connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Web UI base URL.
    pub host: Url,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Lookups after adding a metainfo file with a known hash.
    pub add_poll_attempts: u32,
    /// Delay between those lookups.
    pub add_poll_delay: Duration,
    /// Name-based resolution attempts.
    pub resolve_retries: u32,
    /// Delay between resolution attempts.
    pub resolve_delay: Duration,
}

impl std::fmt::Debug for DaemonConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DaemonConfig")
            .field("host", &self.host.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("add_poll_attempts", &self.add_poll_attempts)
            .field("add_poll_delay", &self.add_poll_delay)
            .field("resolve_retries", &self.resolve_retries)
            .field("resolve_delay", &self.resolve_delay)
            .finish()
    }
}

/// Live feed cadence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Fixed polling cadence.
    pub poll_interval: Duration,
    /// Backoff added per consecutive failure.
    pub backoff_unit: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Persisted record cache lifetime.
    pub records_refresh: Duration,
    /// WebSocket keepalive interval.
    pub ping_interval: Duration,
    /// Bounded queue per WebSocket subscriber.
    pub queue_capacity: usize,
    /// Time one broadcast waits on a slow subscriber.
    pub send_timeout: Duration,
}

/// Access token policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Lifetime of issued access tokens.
    pub token_ttl: chrono::Duration,
}

/// Requested log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatSetting {
    /// Pick by build profile.
    Auto,
    /// Structured JSON lines.
    Json,
    /// Human readable output.
    Pretty,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive.
    pub level: String,
    /// Output format.
    pub format: LogFormatSetting,
}
