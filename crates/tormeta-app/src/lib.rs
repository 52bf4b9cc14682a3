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

//! tormeta application wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and shutdown), `broadcaster.rs` (live
//! feed polling loop), `orchestrator.rs` (background daemon work),
//! `resolver.rs` (late hash discovery).

/// Application bootstrap and environment loading.
pub mod bootstrap;
pub(crate) mod broadcaster;
/// Application-level error types.
pub mod error;
pub(crate) mod orchestrator;
pub(crate) mod resolver;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
