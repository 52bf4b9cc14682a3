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

//! `SQLite` persistence for tormeta: migrations, torrent records, users, and access tokens.

pub mod error;
pub mod pool;
pub mod torrents;
pub mod users;

pub use error::{DataError, Result as DataResult};
pub use pool::connect;
pub use sqlx::SqlitePool;
pub use torrents::SqliteTorrentStore;
pub use users::{AccessTokenRecord, NewUser, UserRecord, UserStore};
