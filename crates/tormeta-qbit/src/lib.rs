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

//! qBittorrent Web API v2 adapter for the [`TransferDaemon`] seam.
//!
//! # Design
//! - One lazily authenticated session per client handle; (re)login is guarded
//!   by an async lock while ordinary calls run concurrently.
//! - Authentication or connection failures discard the session and retry the
//!   call exactly once before surfacing `DaemonUnavailable`.
//! - Every request carries the configured timeout.
//!
//! [`TransferDaemon`]: tormeta_torrent_core::TransferDaemon

pub mod client;
pub mod error;
mod session;

pub use client::{QbitClient, QbitOptions};
pub use error::QbitError;
