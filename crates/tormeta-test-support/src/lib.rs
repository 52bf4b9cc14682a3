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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (record/status builders), store.rs (in-memory store),
//! daemon.rs (scripted daemon), subscribers.rs (recording/failing subscribers).

pub mod daemon;
pub mod fixtures;
pub mod store;
pub mod subscribers;

pub use daemon::ScriptedDaemon;
pub use store::MemoryStore;
pub use subscribers::{FailingSubscriber, RecordingSubscriber};
