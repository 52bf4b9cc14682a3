//! Wire payloads pushed to live-feed clients.
//!
//! # Design
//! - Messages are tagged by `type` so clients can dispatch without sniffing fields.
//! - Field names on [`TorrentView`] are part of the public contract; do not rename.
//! - A [`Frame`] is encoded once and shared by reference across every subscriber.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EventsError, EventsResult};

/// Merged view of a persisted record and its live daemon status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentView {
    /// Persisted record identifier.
    pub id: i64,
    /// Lowercase info-hash, empty when unknown.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Completion percentage in `0..=100`.
    pub progress: u8,
    /// Daemon state label, or `missing` when the daemon does not know the hash.
    pub state: String,
    /// Download rate in bytes per second.
    pub dlspeed: u64,
    /// Upload rate in bytes per second.
    pub upspeed: u64,
    /// Estimated seconds remaining.
    pub eta: Option<i64>,
    /// Poster artwork URL.
    pub poster: Option<String>,
}

/// Messages delivered over the live feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Full point-in-time snapshot of every tracked record.
    TorrentsSnapshot {
        /// Views ordered by descending record id.
        torrents: Vec<TorrentView>,
    },
    /// Keepalive sent on a fixed interval.
    Ping,
}

impl LiveMessage {
    /// Machine-friendly discriminator matching the serialized `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TorrentsSnapshot { .. } => "torrents_snapshot",
            Self::Ping => "ping",
        }
    }
}

/// Pre-encoded JSON text of a [`LiveMessage`].
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Encode a message into a shareable frame.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Encode`] if serialization fails.
    pub fn encode(message: &LiveMessage) -> EventsResult<Self> {
        serde_json::to_string(message)
            .map(|text| Self(Arc::from(text)))
            .map_err(|source| EventsError::Encode {
                kind: message.kind(),
                source,
            })
    }

    /// Keepalive frame.
    #[must_use]
    pub fn ping() -> Self {
        Self(Arc::from(r#"{"type":"ping"}"#))
    }

    /// Borrow the encoded JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Frame")
            .field(&self.0.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn snapshot_message_uses_tagged_wire_shape() -> anyhow::Result<()> {
        let message = LiveMessage::TorrentsSnapshot {
            torrents: vec![TorrentView {
                id: 1,
                hash: "abc".to_string(),
                name: "X".to_string(),
                progress: 50,
                state: "downloading".to_string(),
                dlspeed: 100,
                upspeed: 0,
                eta: Some(60),
                poster: None,
            }],
        };
        let frame = Frame::encode(&message)?;
        let value: Value = serde_json::from_str(frame.as_str())?;
        assert_eq!(
            value,
            json!({
                "type": "torrents_snapshot",
                "torrents": [{
                    "id": 1,
                    "hash": "abc",
                    "name": "X",
                    "progress": 50,
                    "state": "downloading",
                    "dlspeed": 100,
                    "upspeed": 0,
                    "eta": 60,
                    "poster": null
                }]
            })
        );
        Ok(())
    }

    #[test]
    fn ping_frame_matches_encoded_message() -> anyhow::Result<()> {
        let encoded = Frame::encode(&LiveMessage::Ping)?;
        assert_eq!(encoded, Frame::ping());
        assert_eq!(LiveMessage::Ping.kind(), "ping");
        Ok(())
    }
}
