//! Scripted [`TransferDaemon`] that records every call.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tormeta_torrent_core::{
    AddTransfer, InfoHash, LiveTransferStatus, TorrentError, TorrentResult, TransferDaemon,
};

#[derive(Default)]
struct Script {
    transfers: Vec<LiveTransferStatus>,
    failing: bool,
    fail_next: usize,
    list_delay: Duration,
    add_result: Option<InfoHash>,
    added: Vec<AddTransfer>,
    tag_updates: Vec<(InfoHash, Vec<String>)>,
    paused: Vec<InfoHash>,
    resumed: Vec<InfoHash>,
    removed: Vec<(InfoHash, bool)>,
}

/// Daemon fake with programmable transfers and failures.
#[derive(Default)]
pub struct ScriptedDaemon {
    script: Mutex<Script>,
    list_calls: AtomicUsize,
}

impl ScriptedDaemon {
    /// Daemon that reports no transfers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Daemon reporting `transfers`.
    #[must_use]
    pub fn with_transfers(transfers: Vec<LiveTransferStatus>) -> Self {
        let daemon = Self::default();
        daemon.set_transfers(transfers);
        daemon
    }

    /// Replace the reported transfers.
    pub fn set_transfers(&self, transfers: Vec<LiveTransferStatus>) {
        self.lock().transfers = transfers;
    }

    /// Fail every call until reset.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Fail only the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Make `list_transfers` take `delay` before answering.
    pub fn set_list_delay(&self, delay: Duration) {
        self.lock().list_delay = delay;
    }

    /// Hash returned by `add_transfer`.
    pub fn set_add_result(&self, hash: Option<InfoHash>) {
        self.lock().add_result = hash;
    }

    /// Number of `list_transfers`/`find_transfer` calls observed.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Add requests received.
    #[must_use]
    pub fn added(&self) -> Vec<AddTransfer> {
        self.lock().added.clone()
    }

    /// Tag replacements received.
    #[must_use]
    pub fn tag_updates(&self) -> Vec<(InfoHash, Vec<String>)> {
        self.lock().tag_updates.clone()
    }

    /// Paused hashes.
    #[must_use]
    pub fn paused(&self) -> Vec<InfoHash> {
        self.lock().paused.clone()
    }

    /// Resumed hashes.
    #[must_use]
    pub fn resumed(&self) -> Vec<InfoHash> {
        self.lock().resumed.clone()
    }

    /// Removed hashes with their delete-files flag.
    #[must_use]
    pub fn removed(&self) -> Vec<(InfoHash, bool)> {
        self.lock().removed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, operation: &'static str) -> TorrentResult<MutexGuard<'_, Script>> {
        let mut script = self.lock();
        if script.fail_next > 0 {
            script.fail_next -= 1;
            return Err(unavailable(operation));
        }
        if script.failing {
            return Err(unavailable(operation));
        }
        Ok(script)
    }
}

fn unavailable(operation: &'static str) -> TorrentError {
    TorrentError::daemon_unavailable(operation, io::Error::other("scripted daemon failure"))
}

#[async_trait]
impl TransferDaemon for ScriptedDaemon {
    async fn list_transfers(&self) -> TorrentResult<Vec<LiveTransferStatus>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().list_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.enter("scripted.list")?.transfers.clone())
    }

    async fn find_transfer(&self, hash: &InfoHash) -> TorrentResult<Option<LiveTransferStatus>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .enter("scripted.find")?
            .transfers
            .iter()
            .find(|transfer| transfer.hash == *hash)
            .cloned())
    }

    async fn add_transfer(&self, request: AddTransfer) -> TorrentResult<Option<InfoHash>> {
        let mut script = self.enter("scripted.add")?;
        script.added.push(request);
        Ok(script.add_result.clone())
    }

    async fn set_tags(&self, hash: &InfoHash, tags: &[String]) -> TorrentResult<()> {
        self.enter("scripted.set_tags")?
            .tag_updates
            .push((hash.clone(), tags.to_vec()));
        Ok(())
    }

    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.enter("scripted.pause")?.paused.push(hash.clone());
        Ok(())
    }

    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.enter("scripted.resume")?.resumed.push(hash.clone());
        Ok(())
    }

    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()> {
        self.enter("scripted.remove")?
            .removed
            .push((hash.clone(), delete_files));
        Ok(())
    }
}
