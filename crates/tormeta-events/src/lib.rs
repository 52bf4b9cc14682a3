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

//! Live transfer feed primitives for tormeta.
//!
//! The crate owns the JSON wire contract pushed to live-feed clients and the
//! [`ConnectionRegistry`] that fans a single encoded frame out to every
//! connected subscriber. Transport concerns (WebSocket upgrade, keepalive
//! scheduling) stay in the API crate; the registry only sees [`Subscriber`]
//! handles.

pub mod error;
pub mod payloads;
pub mod registry;
pub mod subscriber;

pub use error::{EventsError, EventsResult, SubscriberError};
pub use payloads::{Frame, LiveMessage, TorrentView};
pub use registry::{BroadcastReport, ConnectionRegistry, SubscriberId};
pub use subscriber::{ChannelSubscriber, Subscriber};
