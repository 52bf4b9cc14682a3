//! Builders for records and live statuses.

use chrono::{TimeZone, Utc};
use serde_json::Map;
use tormeta_torrent_core::{InfoHash, LiveTransferStatus, TorrentRecord};

/// Deterministic 40-character hash derived from `seed`.
#[must_use]
pub fn hash(seed: u8) -> InfoHash {
    InfoHash::from_digest(&[seed; 20])
}

/// Persisted record with the given id, optional hash, and name.
#[must_use]
pub fn record(id: i64, hash: Option<InfoHash>, name: &str) -> TorrentRecord {
    let created = Utc
        .timestamp_opt(1_700_000_000 + id, 0)
        .single()
        .unwrap_or_else(Utc::now);
    TorrentRecord {
        id,
        info_hash: hash,
        name: Some(name.to_string()),
        correct_name: None,
        source: Some(format!("magnet:?xt=urn:btih:{id:040}")),
        save_path: None,
        media_type: None,
        season: None,
        episode: None,
        episode_title: None,
        year: None,
        poster: None,
        tmdb_id: None,
        tags: Vec::new(),
        custom_metadata: Map::new(),
        added: false,
        error: None,
        created_at: created,
        updated_at: created,
    }
}

/// Live daemon status for `hash`.
#[must_use]
pub fn live(hash: &InfoHash, name: &str, progress: f64, state: &str) -> LiveTransferStatus {
    LiveTransferStatus {
        hash: hash.clone(),
        name: name.to_string(),
        progress,
        state: state.to_string(),
        dlspeed: 0,
        upspeed: 0,
        eta: None,
    }
}
