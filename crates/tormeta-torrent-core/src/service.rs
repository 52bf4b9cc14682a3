//! Collaborator traits that connect the HTTP surface, the background tasks,
//! the persistence layer, and the transfer daemon.

use async_trait::async_trait;

use crate::error::TorrentResult;
use crate::model::{
    AddTransfer, InfoHash, LiveTransferStatus, NewTorrent, TorrentPatch, TorrentRecord,
};

/// Persistence collaborator for torrent records.
#[async_trait]
pub trait TorrentStore: Send + Sync {
    /// Fetch a record by id.
    async fn get_by_id(&self, id: i64) -> TorrentResult<Option<TorrentRecord>>;

    /// Find a record whose source or info-hash equals `key`.
    async fn find_by_source_or_hash(&self, key: &str) -> TorrentResult<Option<TorrentRecord>>;

    /// Every record, newest first.
    async fn list_all(&self) -> TorrentResult<Vec<TorrentRecord>>;

    /// At most `limit` records, newest first.
    async fn list_recent(&self, limit: u32) -> TorrentResult<Vec<TorrentRecord>>;

    /// Insert a new record with `added = false`.
    async fn create(&self, fields: NewTorrent) -> TorrentResult<TorrentRecord>;

    /// Apply a partial update.
    ///
    /// Returns `TorrentError::NotFound` when the record does not exist.
    async fn update(&self, id: i64, patch: TorrentPatch) -> TorrentResult<TorrentRecord>;

    /// Store the confirmed hash, set `added`, and clear any previous error.
    async fn mark_added(&self, id: i64, hash: &InfoHash) -> TorrentResult<()>;

    /// Store a background failure and reset `added`.
    async fn record_error(&self, id: i64, message: &str) -> TorrentResult<()>;

    /// Delete a record. Returns `false` when it did not exist.
    async fn delete(&self, id: i64) -> TorrentResult<bool>;
}

/// Control surface of the external transfer daemon.
#[async_trait]
pub trait TransferDaemon: Send + Sync {
    /// Every transfer the daemon currently tracks.
    async fn list_transfers(&self) -> TorrentResult<Vec<LiveTransferStatus>>;

    /// The transfer with exactly this hash, if the daemon reports it.
    async fn find_transfer(&self, hash: &InfoHash) -> TorrentResult<Option<LiveTransferStatus>>;

    /// Submit a transfer. Returns the hash when it can be determined.
    async fn add_transfer(&self, request: AddTransfer) -> TorrentResult<Option<InfoHash>>;

    /// Replace the daemon-side tags of a transfer.
    async fn set_tags(&self, hash: &InfoHash, tags: &[String]) -> TorrentResult<()>;

    /// Pause a transfer.
    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()>;

    /// Resume a paused transfer.
    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()>;

    /// Remove a transfer, optionally deleting downloaded data.
    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()>;
}

/// Hooks the HTTP surface uses to trigger background daemon work.
#[async_trait]
pub trait TransferWorkflow: Send + Sync {
    /// Hand a freshly stored record to the daemon in the background.
    ///
    /// Failures are recorded on the record rather than returned.
    async fn submit(&self, record: TorrentRecord) -> TorrentResult<()>;

    /// Push the record's tags to the daemon in the background.
    async fn sync_tags(&self, record: TorrentRecord) -> TorrentResult<()>;

    /// Pause the transfer.
    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()>;

    /// Resume the transfer.
    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()>;

    /// Remove the transfer from the daemon.
    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()>;

    /// Tell the live feed that persisted records changed.
    fn records_changed(&self);
}
