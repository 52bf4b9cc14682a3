//! Defaults applied when an environment key is absent.

/// HTTP listener address.
pub const BIND_ADDR: &str = "0.0.0.0:8000";
/// `SQLite` database location.
pub const DATABASE_URL: &str = "sqlite://tormeta.db";
/// Directory receiving uploaded metainfo files.
pub const UPLOAD_DIR: &str = "uploads";
/// qBittorrent Web UI base URL.
pub const QBT_HOST: &str = "http://127.0.0.1:8080";
/// qBittorrent Web UI user.
pub const QBT_USER: &str = "admin";
/// qBittorrent Web UI password.
pub const QBT_PASS: &str = "adminadmin";
/// Per-request daemon timeout in seconds.
pub const QBT_TIMEOUT_SECS: u64 = 5;
/// Lookups after adding a metainfo file.
pub const QBT_ADD_POLL_ATTEMPTS: u32 = 10;
/// Delay between those lookups in milliseconds.
pub const QBT_ADD_POLL_DELAY_MS: u64 = 500;
/// Name-based hash resolution attempts.
pub const QBT_POLL_RETRIES: u32 = 10;
/// Delay between resolution attempts in milliseconds.
pub const QBT_POLL_DELAY_MS: u64 = 1_000;
/// Live feed polling cadence in seconds.
pub const BROADCAST_INTERVAL_SECS: u64 = 3;
/// Backoff added per consecutive failure, in seconds.
pub const BROADCAST_BACKOFF_UNIT_SECS: u64 = 5;
/// Backoff ceiling in seconds.
pub const BROADCAST_MAX_BACKOFF_SECS: u64 = 30;
/// Persisted record cache lifetime in seconds.
pub const RECORDS_REFRESH_SECS: u64 = 30;
/// WebSocket keepalive interval in seconds.
pub const WS_PING_SECS: u64 = 15;
/// Bounded queue per WebSocket subscriber.
pub const WS_QUEUE_CAPACITY: usize = 16;
/// Time a broadcast waits on one slow subscriber, in milliseconds.
pub const WS_SEND_TIMEOUT_MS: u64 = 2_000;
/// Access token lifetime (three days).
pub const ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 4_320;
/// Default tracing directive.
pub const LOG_LEVEL: &str = "info";
