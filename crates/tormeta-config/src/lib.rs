#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Runtime configuration and account identity.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment parsing and
//! validation), `identity.rs` (registration, login, bearer token checks),
//! `secrets.rs` (argon2 hashing and token generation).

pub mod defaults;
pub mod error;
pub mod identity;
pub mod loader;
pub mod model;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use identity::{Account, Identity, IdentityService, IssuedToken, Registration};
pub use model::{
    AppConfig, AuthConfig, BroadcastConfig, DaemonConfig, DatabaseConfig, HttpConfig,
    LogFormatSetting, LoggingSettings,
};
