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

//! HTTP surface for tormeta: accounts, torrent records, and the live WebSocket feed.
//!
//! Layout: `identity.rs` (account facade), `state.rs` (shared handler state),
//! `http/` (router, middleware, handlers), `error.rs` (server lifecycle errors).

pub mod error;
pub(crate) mod http;
pub mod identity;
pub(crate) mod state;
#[cfg(test)]
mod testing;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use identity::{IdentityFacade, SharedIdentity};
pub use state::ApiDependencies;
