//! Torrent record DTOs shared by the handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tormeta_torrent_core::TorrentRecord;

pub(crate) mod handlers;
pub(crate) mod ingest;

/// Wire shape of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TorrentOut {
    pub(crate) id: i64,
    pub(crate) info_hash: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) correct_name: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) save_path: Option<String>,
    pub(crate) media_type: Option<String>,
    pub(crate) season: Option<i32>,
    pub(crate) episode: Option<i32>,
    pub(crate) episode_title: Option<String>,
    pub(crate) year: Option<i32>,
    pub(crate) poster: Option<String>,
    pub(crate) tmdb_id: Option<i64>,
    pub(crate) tags: Vec<String>,
    pub(crate) custom_metadata: Map<String, Value>,
    pub(crate) qb_added: bool,
    pub(crate) qb_error: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl From<TorrentRecord> for TorrentOut {
    fn from(record: TorrentRecord) -> Self {
        Self {
            id: record.id,
            info_hash: record.info_hash.map(String::from),
            name: record.name,
            correct_name: record.correct_name,
            source: record.source,
            save_path: record.save_path,
            media_type: record.media_type,
            season: record.season,
            episode: record.episode,
            episode_title: record.episode_title,
            year: record.year,
            poster: record.poster,
            tmdb_id: record.tmdb_id,
            tags: record.tags,
            custom_metadata: record.custom_metadata,
            qb_added: record.added,
            qb_error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Body returned by daemon control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Acknowledged {
    pub(crate) ok: bool,
}

impl Acknowledged {
    pub(crate) const OK: Self = Self { ok: true };
}
