//! Background daemon work triggered by the HTTP surface.
//!
//! Adds and tag pushes run as detached tasks; their failures land on the
//! record's `error` field. Pause, resume, and remove answer the caller directly.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tormeta_torrent_core::{
    AddTransfer, InfoHash, TorrentError, TorrentRecord, TorrentResult, TorrentStore,
    TransferDaemon, TransferWorkflow,
};
use tracing::{info, warn};

use crate::broadcaster::Broadcaster;
use crate::resolver::HashResolver;

/// Error message stored on a record, including the source chain.
fn describe(err: &TorrentError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// [`TransferWorkflow`] backed by the daemon client, the record store, and the live feed.
#[derive(Clone)]
pub(crate) struct TransferOrchestrator {
    daemon: Arc<dyn TransferDaemon>,
    store: Arc<dyn TorrentStore>,
    resolver: HashResolver,
    feed: Broadcaster,
}

impl TransferOrchestrator {
    pub(crate) fn new(
        daemon: Arc<dyn TransferDaemon>,
        store: Arc<dyn TorrentStore>,
        resolver: HashResolver,
        feed: Broadcaster,
    ) -> Self {
        Self {
            daemon,
            store,
            resolver,
            feed,
        }
    }

    /// Hand `record` to the daemon and settle its `added`/`error` state.
    pub(crate) async fn process_submission(&self, record: TorrentRecord) {
        let request = match AddTransfer::for_record(&record) {
            Ok(request) => request,
            Err(err) => {
                self.fail(record.id, &err).await;
                return;
            }
        };
        match self.daemon.add_transfer(request).await {
            Ok(Some(hash)) => match self.store.mark_added(record.id, &hash).await {
                Ok(()) => {
                    info!(record_id = record.id, info_hash = %hash, "transfer added");
                    self.feed.notify_records_changed();
                }
                Err(err) => {
                    warn!(error = %err, record_id = record.id, "failed to mark transfer added");
                }
            },
            Ok(None) => {
                let hint = match record.name.as_deref() {
                    Some(name) if !name.is_empty() => name,
                    _ => record.display_name(),
                };
                let _ = self.resolver.resolve(hint, record.id).await;
            }
            Err(err) => self.fail(record.id, &err).await,
        }
    }

    /// Push the record's tags to the daemon, recording any failure on the record.
    pub(crate) async fn process_tags(&self, record: TorrentRecord) {
        let Some(hash) = record.info_hash.as_ref() else {
            return;
        };
        if let Err(err) = self.daemon.set_tags(hash, &record.tags).await {
            self.fail(record.id, &err).await;
        }
    }

    async fn fail(&self, record_id: i64, err: &TorrentError) {
        let message = describe(err);
        warn!(error = %message, record_id, "background transfer work failed");
        match self.store.record_error(record_id, &message).await {
            Ok(()) => self.feed.notify_records_changed(),
            Err(store_err) => {
                warn!(error = %store_err, record_id, "failed to record transfer error");
            }
        }
    }

    fn spawn_submission(&self, record: TorrentRecord) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.process_submission(record).await })
    }

    fn spawn_tags(&self, record: TorrentRecord) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.process_tags(record).await })
    }
}

#[async_trait]
impl TransferWorkflow for TransferOrchestrator {
    async fn submit(&self, record: TorrentRecord) -> TorrentResult<()> {
        drop(self.spawn_submission(record));
        Ok(())
    }

    async fn sync_tags(&self, record: TorrentRecord) -> TorrentResult<()> {
        if record.info_hash.is_some() {
            drop(self.spawn_tags(record));
        }
        Ok(())
    }

    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.daemon.pause(hash).await
    }

    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.daemon.resume(hash).await
    }

    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()> {
        self.daemon.remove(hash, delete_files).await
    }

    fn records_changed(&self) {
        self.feed.notify_records_changed();
    }
}
