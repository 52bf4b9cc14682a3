//! In-memory [`TorrentStore`].

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tormeta_torrent_core::{
    InfoHash, NewTorrent, TorrentError, TorrentPatch, TorrentRecord, TorrentResult, TorrentStore,
};

/// Vector-backed store with failure injection and call counting.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TorrentRecord>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: Vec<TorrentRecord>) -> Self {
        let next = records.iter().map(|record| record.id).max().unwrap_or(0);
        let store = Self::default();
        store
            .next_id
            .store(usize::try_from(next).unwrap_or(0), Ordering::SeqCst);
        *store.lock() = records;
        store
    }

    /// Make every subsequent call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `list_all`/`list_recent` calls observed.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn records(&self) -> Vec<TorrentRecord> {
        self.lock().clone()
    }

    /// Insert or replace a record directly.
    pub fn upsert(&self, record: TorrentRecord) {
        let mut records = self.lock();
        records.retain(|existing| existing.id != record.id);
        records.push(record);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TorrentRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: &'static str) -> TorrentResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TorrentError::store(
                operation,
                io::Error::other("injected store failure"),
            ));
        }
        Ok(())
    }

    fn newest_first(&self) -> Vec<TorrentRecord> {
        let mut records = self.records();
        records.sort_by(|left, right| right.id.cmp(&left.id));
        records
    }

    fn modify(
        &self,
        id: i64,
        apply: impl FnOnce(&mut TorrentRecord),
    ) -> TorrentResult<TorrentRecord> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(TorrentError::NotFound { record_id: id })?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[async_trait]
impl TorrentStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> TorrentResult<Option<TorrentRecord>> {
        self.check("memory.get")?;
        Ok(self.lock().iter().find(|record| record.id == id).cloned())
    }

    async fn find_by_source_or_hash(&self, key: &str) -> TorrentResult<Option<TorrentRecord>> {
        self.check("memory.find")?;
        let lowered = key.to_ascii_lowercase();
        Ok(self.newest_first().into_iter().find(|record| {
            record.source.as_deref() == Some(key)
                || record
                    .info_hash
                    .as_ref()
                    .is_some_and(|hash| hash.as_str() == lowered)
        }))
    }

    async fn list_all(&self) -> TorrentResult<Vec<TorrentRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check("memory.list_all")?;
        Ok(self.newest_first())
    }

    async fn list_recent(&self, limit: u32) -> TorrentResult<Vec<TorrentRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check("memory.list_recent")?;
        let mut records = self.newest_first();
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }

    async fn create(&self, fields: NewTorrent) -> TorrentResult<TorrentRecord> {
        self.check("memory.create")?;
        let id = i64::try_from(self.next_id.fetch_add(1, Ordering::SeqCst) + 1).unwrap_or(i64::MAX);
        let now = Utc::now();
        let record = TorrentRecord {
            id,
            info_hash: fields.info_hash,
            name: fields.name,
            correct_name: fields.correct_name,
            source: Some(fields.source),
            save_path: fields.save_path,
            media_type: fields.media_type,
            season: fields.season,
            episode: fields.episode,
            episode_title: fields.episode_title,
            year: fields.year,
            poster: fields.poster,
            tmdb_id: fields.tmdb_id,
            tags: fields.tags,
            custom_metadata: fields.custom_metadata,
            added: false,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, patch: TorrentPatch) -> TorrentResult<TorrentRecord> {
        self.check("memory.update")?;
        self.modify(id, |record| {
            fn set<T>(slot: &mut Option<T>, value: Option<T>) {
                if value.is_some() {
                    *slot = value;
                }
            }
            set(&mut record.info_hash, patch.info_hash);
            set(&mut record.name, patch.name);
            set(&mut record.correct_name, patch.correct_name);
            set(&mut record.save_path, patch.save_path);
            set(&mut record.media_type, patch.media_type);
            set(&mut record.season, patch.season);
            set(&mut record.episode, patch.episode);
            set(&mut record.episode_title, patch.episode_title);
            set(&mut record.year, patch.year);
            set(&mut record.poster, patch.poster);
            set(&mut record.tmdb_id, patch.tmdb_id);
            if let Some(tags) = patch.tags {
                record.tags = tags;
            }
            if let Some(metadata) = patch.custom_metadata {
                record.custom_metadata = metadata;
            }
        })
    }

    async fn mark_added(&self, id: i64, hash: &InfoHash) -> TorrentResult<()> {
        self.check("memory.mark_added")?;
        self.modify(id, |record| {
            record.info_hash = Some(hash.clone());
            record.added = true;
            record.error = None;
        })
        .map(|_| ())
    }

    async fn record_error(&self, id: i64, message: &str) -> TorrentResult<()> {
        self.check("memory.record_error")?;
        self.modify(id, |record| {
            record.added = false;
            record.error = Some(message.to_string());
        })
        .map(|_| ())
    }

    async fn delete(&self, id: i64) -> TorrentResult<bool> {
        self.check("memory.delete")?;
        let mut records = self.lock();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() != before)
    }
}
