//! Late hash discovery for transfers the daemon accepted without reporting a hash.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tormeta_torrent_core::{InfoHash, TorrentError, TorrentStore, TransferDaemon};
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;

/// Lowercase name with its final extension removed.
fn normalize(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_string(), |stem| stem.to_string_lossy().into_owned())
        .to_lowercase()
}

/// Daemon names are compared whole; a stem match covers names that keep an extension.
fn names_match(daemon_name: &str, wanted: &str) -> bool {
    daemon_name.to_lowercase() == wanted || normalize(daemon_name) == wanted
}

/// Matches daemon transfers to stored records by name.
#[derive(Clone)]
pub(crate) struct HashResolver {
    daemon: Arc<dyn TransferDaemon>,
    store: Arc<dyn TorrentStore>,
    feed: Broadcaster,
    retries: u32,
    delay: Duration,
}

impl HashResolver {
    pub(crate) fn new(
        daemon: Arc<dyn TransferDaemon>,
        store: Arc<dyn TorrentStore>,
        feed: Broadcaster,
        retries: u32,
        delay: Duration,
    ) -> Self {
        Self {
            daemon,
            store,
            feed,
            retries,
            delay,
        }
    }

    /// Poll the daemon for a transfer named like `name_hint` and mark `record_id` added.
    ///
    /// Returns `None` once the retry budget is spent; the record is left untouched.
    pub(crate) async fn resolve(&self, name_hint: &str, record_id: i64) -> Option<InfoHash> {
        let wanted = normalize(name_hint);
        for attempt in 1..=self.retries {
            match self.daemon.list_transfers().await {
                Ok(transfers) => {
                    if let Some(hit) = transfers
                        .into_iter()
                        .find(|transfer| names_match(&transfer.name, &wanted))
                    {
                        self.confirm(record_id, &hit.hash).await;
                        return Some(hit.hash);
                    }
                    debug!(record_id, attempt, name = %wanted, "transfer not visible yet");
                }
                Err(err) => {
                    warn!(error = %err, record_id, attempt, "hash lookup failed");
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.delay).await;
            }
        }
        let timeout = TorrentError::ResolutionTimeout {
            record_id,
            attempts: self.retries,
        };
        info!(error = %timeout, record_id, name = %wanted, "giving up on hash resolution");
        None
    }

    async fn confirm(&self, record_id: i64, hash: &InfoHash) {
        match self.store.mark_added(record_id, hash).await {
            Ok(()) => {
                info!(record_id, info_hash = %hash, "transfer hash resolved");
                self.feed.notify_records_changed();
            }
            Err(err) => {
                warn!(error = %err, record_id, info_hash = %hash, "failed to store resolved hash");
            }
        }
    }
}
