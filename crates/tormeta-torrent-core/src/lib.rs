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

//! Daemon-agnostic torrent metadata model, parsing helpers, and collaborator traits.
//!
//! Layout: `model.rs` (records and live status), `magnet.rs`/`metainfo.rs`
//! (info-hash extraction), `tags.rs` (tag encoding), `snapshot.rs` (live view
//! merge), `service.rs` (store, daemon, and workflow seams).

pub mod error;
pub mod magnet;
pub mod metainfo;
pub mod model;
pub mod service;
pub mod snapshot;
pub mod tags;

pub use error::{BoxError, TorrentError, TorrentResult};
pub use magnet::{MagnetLink, parse_magnet};
pub use metainfo::info_hash_from_metainfo;
pub use model::{
    AddTransfer, InfoHash, LiveTransferStatus, NewTorrent, RawTransfer, TorrentPatch,
    TorrentRecord, TransferSource,
};
pub use service::{TorrentStore, TransferDaemon, TransferWorkflow};
pub use snapshot::{MISSING_STATE, build_snapshot};
pub use tags::{normalize_tags, parse_tag_list};
