//! Environment parsing and validation.
//!
//! # Design
//! - Every key has a default so an empty environment yields a runnable setup.
//! - Values are validated eagerly; the first invalid key aborts loading.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, AuthConfig, BroadcastConfig, DaemonConfig, DatabaseConfig, HttpConfig,
    LogFormatSetting, LoggingSettings,
};

impl AppConfig {
    /// Load configuration from the process environment, reading `.env` first
    /// when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first value that fails
    /// validation.
    pub fn from_env() -> ConfigResult<Self> {
        if let Err(err) = dotenv::dotenv() {
            debug!(error = %err, "no .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first value that fails
    /// validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        Ok(Self {
            http: env.http()?,
            database: DatabaseConfig {
                url: env.text("DATABASE_URL", defaults::DATABASE_URL),
            },
            daemon: env.daemon()?,
            broadcast: env.broadcast()?,
            auth: env.auth()?,
            logging: env.logging()?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn text(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn number<T>(&self, section: &'static str, key: &'static str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
    {
        self.raw(key).map_or(Ok(default), |value| {
            value
                .parse()
                .map_err(|_| ConfigError::invalid(section, key, Some(&value), "not_a_number"))
        })
    }

    fn positive<T>(&self, section: &'static str, key: &'static str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Default + PartialOrd + ToString,
    {
        let value = self.number(section, key, default)?;
        if value > T::default() {
            Ok(value)
        } else {
            Err(ConfigError::invalid(
                section,
                key,
                Some(&value.to_string()),
                "must_be_positive",
            ))
        }
    }

    fn seconds(&self, section: &'static str, key: &'static str, default: u64) -> ConfigResult<Duration> {
        self.positive(section, key, default).map(Duration::from_secs)
    }

    fn millis(&self, section: &'static str, key: &'static str, default: u64) -> ConfigResult<Duration> {
        self.positive(section, key, default).map(Duration::from_millis)
    }

    fn http(&self) -> ConfigResult<HttpConfig> {
        let raw_addr = self.text("TORMETA_BIND_ADDR", defaults::BIND_ADDR);
        let bind_addr = SocketAddr::from_str(&raw_addr).map_err(|_| {
            ConfigError::invalid("http", "TORMETA_BIND_ADDR", Some(&raw_addr), "unparseable")
        })?;
        Ok(HttpConfig {
            bind_addr,
            upload_dir: PathBuf::from(self.text("UPLOAD_DIR", defaults::UPLOAD_DIR)),
        })
    }

    fn daemon(&self) -> ConfigResult<DaemonConfig> {
        let raw_host = self.text("QBT_HOST", defaults::QBT_HOST);
        let host = Url::parse(&raw_host)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .ok_or_else(|| ConfigError::invalid("daemon", "QBT_HOST", Some(&raw_host), "not_http_url"))?;
        Ok(DaemonConfig {
            host,
            username: self.text("QBT_USER", defaults::QBT_USER),
            password: self.text("QBT_PASS", defaults::QBT_PASS),
            timeout: self.seconds("daemon", "QBT_TIMEOUT_SECS", defaults::QBT_TIMEOUT_SECS)?,
            add_poll_attempts: self.positive(
                "daemon",
                "QBT_ADD_POLL_ATTEMPTS",
                defaults::QBT_ADD_POLL_ATTEMPTS,
            )?,
            add_poll_delay: self.millis(
                "daemon",
                "QBT_ADD_POLL_DELAY_MS",
                defaults::QBT_ADD_POLL_DELAY_MS,
            )?,
            resolve_retries: self.positive("daemon", "QBT_POLL_RETRIES", defaults::QBT_POLL_RETRIES)?,
            resolve_delay: self.millis("daemon", "QBT_POLL_DELAY_MS", defaults::QBT_POLL_DELAY_MS)?,
        })
    }

    fn broadcast(&self) -> ConfigResult<BroadcastConfig> {
        let backoff_unit = self.seconds(
            "broadcast",
            "BROADCAST_BACKOFF_UNIT_SECS",
            defaults::BROADCAST_BACKOFF_UNIT_SECS,
        )?;
        let max_backoff = self.seconds(
            "broadcast",
            "BROADCAST_MAX_BACKOFF_SECS",
            defaults::BROADCAST_MAX_BACKOFF_SECS,
        )?;
        if max_backoff < backoff_unit {
            return Err(ConfigError::invalid(
                "broadcast",
                "BROADCAST_MAX_BACKOFF_SECS",
                Some(&max_backoff.as_secs().to_string()),
                "below_backoff_unit",
            ));
        }
        Ok(BroadcastConfig {
            poll_interval: self.seconds(
                "broadcast",
                "BROADCAST_INTERVAL_SECS",
                defaults::BROADCAST_INTERVAL_SECS,
            )?,
            backoff_unit,
            max_backoff,
            records_refresh: self.seconds(
                "broadcast",
                "RECORDS_REFRESH_SECS",
                defaults::RECORDS_REFRESH_SECS,
            )?,
            ping_interval: self.seconds("broadcast", "WS_PING_SECS", defaults::WS_PING_SECS)?,
            queue_capacity: defaults::WS_QUEUE_CAPACITY,
            send_timeout: Duration::from_millis(defaults::WS_SEND_TIMEOUT_MS),
        })
    }

    fn auth(&self) -> ConfigResult<AuthConfig> {
        let minutes = self.positive(
            "auth",
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            defaults::ACCESS_TOKEN_EXPIRE_MINUTES,
        )?;
        Ok(AuthConfig {
            token_ttl: chrono::Duration::minutes(minutes),
        })
    }

    fn logging(&self) -> ConfigResult<LoggingSettings> {
        let format = match self.raw("TORMETA_LOG_FORMAT") {
            None => LogFormatSetting::Auto,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "auto" => LogFormatSetting::Auto,
                "json" => LogFormatSetting::Json,
                "pretty" | "text" => LogFormatSetting::Pretty,
                _ => {
                    return Err(ConfigError::invalid(
                        "logging",
                        "TORMETA_LOG_FORMAT",
                        Some(&value),
                        "unknown_format",
                    ));
                }
            },
        };
        Ok(LoggingSettings {
            level: self.text("TORMETA_LOG_LEVEL", defaults::LOG_LEVEL),
            format,
        })
    }
}
