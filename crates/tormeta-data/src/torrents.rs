//! Torrent record repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use tormeta_torrent_core::tags::{decode_tags, encode_tags};
use tormeta_torrent_core::{
    InfoHash, NewTorrent, TorrentError, TorrentPatch, TorrentRecord, TorrentResult, TorrentStore,
};
use tracing::warn;

use crate::error::{DataError, Result};

const TORRENT_COLUMNS: &str = "id, info_hash, name, correct_name, source, save_path, media_type, \
     season, episode, episode_title, year, poster, tmdb_id, tags, custom_metadata, added, error, \
     created_at, updated_at";

const INSERT_TORRENT: &str = r"
    INSERT INTO torrents (
        info_hash, name, correct_name, source, save_path, media_type, season, episode,
        episode_title, year, poster, tmdb_id, tags, custom_metadata, added, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15, ?15)
    RETURNING ";

const UPDATE_TORRENT: &str = r"
    UPDATE torrents SET
        info_hash = COALESCE(?1, info_hash),
        name = COALESCE(?2, name),
        correct_name = COALESCE(?3, correct_name),
        save_path = COALESCE(?4, save_path),
        media_type = COALESCE(?5, media_type),
        season = COALESCE(?6, season),
        episode = COALESCE(?7, episode),
        episode_title = COALESCE(?8, episode_title),
        year = COALESCE(?9, year),
        poster = COALESCE(?10, poster),
        tmdb_id = COALESCE(?11, tmdb_id),
        tags = COALESCE(?12, tags),
        custom_metadata = COALESCE(?13, custom_metadata),
        updated_at = ?14
    WHERE id = ?15
    RETURNING ";

const MARK_ADDED: &str = r"
    UPDATE torrents
    SET info_hash = ?1, added = 1, error = NULL, updated_at = ?2
    WHERE id = ?3
";

const RECORD_ERROR: &str = r"
    UPDATE torrents
    SET added = 0, error = ?1, updated_at = ?2
    WHERE id = ?3
";

const DELETE_TORRENT: &str = r"DELETE FROM torrents WHERE id = ?1";

#[derive(Debug, FromRow)]
struct TorrentRow {
    id: i64,
    info_hash: Option<String>,
    name: Option<String>,
    correct_name: Option<String>,
    source: Option<String>,
    save_path: Option<String>,
    media_type: Option<String>,
    season: Option<i32>,
    episode: Option<i32>,
    episode_title: Option<String>,
    year: Option<i32>,
    poster: Option<String>,
    tmdb_id: Option<i64>,
    tags: String,
    custom_metadata: String,
    added: bool,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TorrentRow {
    fn into_record(self) -> TorrentRecord {
        let info_hash = self
            .info_hash
            .filter(|value| !value.is_empty())
            .and_then(|value| match InfoHash::parse(&value) {
                Ok(hash) => Some(hash),
                Err(err) => {
                    warn!(error = %err, torrent_id = self.id, "ignoring malformed stored info-hash");
                    None
                }
            });
        TorrentRecord {
            id: self.id,
            info_hash,
            name: self.name,
            correct_name: self.correct_name,
            source: self.source,
            save_path: self.save_path,
            media_type: self.media_type,
            season: self.season,
            episode: self.episode,
            episode_title: self.episode_title,
            year: self.year,
            poster: self.poster,
            tmdb_id: self.tmdb_id,
            tags: decode_tags(&self.tags),
            custom_metadata: decode_metadata(&self.custom_metadata),
            added: self.added,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn decode_metadata(stored: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(stored) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn encode_metadata(metadata: &Map<String, Value>) -> String {
    Value::Object(metadata.clone()).to_string()
}

/// `SQLite`-backed implementation of [`TorrentStore`].
#[derive(Clone)]
pub struct SqliteTorrentStore {
    pool: SqlitePool,
}

impl SqliteTorrentStore {
    /// Wrap an already migrated pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity probe used by health checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot answer a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| DataError::query("torrents.ping", err))
    }
}

fn store_failure(operation: &'static str) -> impl FnOnce(sqlx::Error) -> TorrentError {
    move |err| TorrentError::store(operation, DataError::query(operation, err))
}

#[async_trait]
impl TorrentStore for SqliteTorrentStore {
    async fn get_by_id(&self, id: i64) -> TorrentResult<Option<TorrentRecord>> {
        let sql = format!("SELECT {TORRENT_COLUMNS} FROM torrents WHERE id = ?1");
        sqlx::query_as::<_, TorrentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(TorrentRow::into_record))
            .map_err(store_failure("torrents.get"))
    }

    async fn find_by_source_or_hash(&self, key: &str) -> TorrentResult<Option<TorrentRecord>> {
        let sql = format!(
            "SELECT {TORRENT_COLUMNS} FROM torrents \
             WHERE source = ?1 OR info_hash = lower(?1) ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, TorrentRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(TorrentRow::into_record))
            .map_err(store_failure("torrents.find"))
    }

    async fn list_all(&self) -> TorrentResult<Vec<TorrentRecord>> {
        let sql = format!("SELECT {TORRENT_COLUMNS} FROM torrents ORDER BY id DESC");
        sqlx::query_as::<_, TorrentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(TorrentRow::into_record).collect())
            .map_err(store_failure("torrents.list_all"))
    }

    async fn list_recent(&self, limit: u32) -> TorrentResult<Vec<TorrentRecord>> {
        let sql = format!(
            "SELECT {TORRENT_COLUMNS} FROM torrents ORDER BY created_at DESC, id DESC LIMIT ?1"
        );
        sqlx::query_as::<_, TorrentRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(TorrentRow::into_record).collect())
            .map_err(store_failure("torrents.list_recent"))
    }

    async fn create(&self, fields: NewTorrent) -> TorrentResult<TorrentRecord> {
        let sql = format!("{INSERT_TORRENT}{TORRENT_COLUMNS}");
        sqlx::query_as::<_, TorrentRow>(&sql)
            .bind(fields.info_hash.as_ref().map(InfoHash::as_str))
            .bind(fields.name.as_deref())
            .bind(fields.correct_name.as_deref())
            .bind(fields.source.as_str())
            .bind(fields.save_path.as_deref())
            .bind(fields.media_type.as_deref())
            .bind(fields.season)
            .bind(fields.episode)
            .bind(fields.episode_title.as_deref())
            .bind(fields.year)
            .bind(fields.poster.as_deref())
            .bind(fields.tmdb_id)
            .bind(encode_tags(&fields.tags))
            .bind(encode_metadata(&fields.custom_metadata))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map(TorrentRow::into_record)
            .map_err(store_failure("torrents.create"))
    }

    async fn update(&self, id: i64, patch: TorrentPatch) -> TorrentResult<TorrentRecord> {
        let sql = format!("{UPDATE_TORRENT}{TORRENT_COLUMNS}");
        let row = sqlx::query_as::<_, TorrentRow>(&sql)
            .bind(patch.info_hash.as_ref().map(InfoHash::as_str))
            .bind(patch.name.as_deref())
            .bind(patch.correct_name.as_deref())
            .bind(patch.save_path.as_deref())
            .bind(patch.media_type.as_deref())
            .bind(patch.season)
            .bind(patch.episode)
            .bind(patch.episode_title.as_deref())
            .bind(patch.year)
            .bind(patch.poster.as_deref())
            .bind(patch.tmdb_id)
            .bind(patch.tags.as_deref().map(encode_tags))
            .bind(patch.custom_metadata.as_ref().map(encode_metadata))
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_failure("torrents.update"))?;
        row.map(TorrentRow::into_record)
            .ok_or(TorrentError::NotFound { record_id: id })
    }

    async fn mark_added(&self, id: i64, hash: &InfoHash) -> TorrentResult<()> {
        let result = sqlx::query(MARK_ADDED)
            .bind(hash.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_failure("torrents.mark_added"))?;
        if result.rows_affected() == 0 {
            return Err(TorrentError::NotFound { record_id: id });
        }
        Ok(())
    }

    async fn record_error(&self, id: i64, message: &str) -> TorrentResult<()> {
        let result = sqlx::query(RECORD_ERROR)
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_failure("torrents.record_error"))?;
        if result.rows_affected() == 0 {
            return Err(TorrentError::NotFound { record_id: id });
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> TorrentResult<bool> {
        sqlx::query(DELETE_TORRENT)
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected() > 0)
            .map_err(store_failure("torrents.delete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_metadata_falls_back_to_empty_object() {
        assert!(decode_metadata("not json").is_empty());
        assert!(decode_metadata("[1,2]").is_empty());
        let map = decode_metadata(r#"{"quality":"1080p"}"#);
        assert_eq!(map.get("quality"), Some(&Value::from("1080p")));
        assert_eq!(encode_metadata(&map), r#"{"quality":"1080p"}"#);
    }
}
