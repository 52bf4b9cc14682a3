//! Live feed loop: poll the daemon, merge with stored records, fan out on change.
//!
//! # Design
//! - Ticks are scheduled against absolute deadlines; a slow cycle never shifts the cadence.
//! - Each cycle runs in its own task and owns the cycle lock for its whole lifetime, so the
//!   last snapshot and the record cache have a single writer. A tick that cannot take the
//!   lock is skipped.
//! - With no subscribers the cycle makes no collaborator calls and forgets the last snapshot.
//! - Failures never end the loop; they push the next deadline out by a bounded backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tormeta_config::BroadcastConfig;
use tormeta_events::{ConnectionRegistry, LiveMessage, TorrentView};
use tormeta_telemetry::{CycleOutcome, Metrics};
use tormeta_torrent_core::{
    TorrentRecord, TorrentResult, TorrentStore, TransferDaemon, build_snapshot,
};
use tracing::{debug, info, warn};

/// Backoff after `failures` consecutive failed cycles.
#[must_use]
pub(crate) fn backoff_delay(failures: u32, unit: Duration, max: Duration) -> Duration {
    unit.saturating_mul(failures).min(max)
}

/// Handle to the live feed loop. Clones share the same state.
#[derive(Clone)]
pub(crate) struct Broadcaster {
    shared: Arc<Shared>,
}

struct Shared {
    registry: ConnectionRegistry,
    daemon: Arc<dyn TransferDaemon>,
    store: Arc<dyn TorrentStore>,
    metrics: Metrics,
    settings: BroadcastConfig,
    records_stale: AtomicBool,
    cycle: Arc<Mutex<CycleState>>,
}

#[derive(Default)]
struct CycleState {
    last_snapshot: Option<Vec<TorrentView>>,
    records: Vec<TorrentRecord>,
    records_loaded_at: Option<Instant>,
    failures: u32,
}

struct CycleReport {
    outcome: CycleOutcome,
    backoff: Option<Duration>,
}

impl CycleReport {
    const fn settled(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            backoff: None,
        }
    }
}

impl Broadcaster {
    pub(crate) fn new(
        registry: ConnectionRegistry,
        daemon: Arc<dyn TransferDaemon>,
        store: Arc<dyn TorrentStore>,
        metrics: Metrics,
        settings: BroadcastConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                daemon,
                store,
                metrics,
                settings,
                records_stale: AtomicBool::new(true),
                cycle: Arc::new(Mutex::new(CycleState::default())),
            }),
        }
    }

    /// Mark the record cache stale so the next cycle reloads it.
    pub(crate) fn notify_records_changed(&self) {
        self.shared.records_stale.store(true, Ordering::Release);
    }

    /// Start the loop on the current runtime.
    pub(crate) fn spawn(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move { broadcaster.run(shutdown).await })
    }

    /// Drive cycles until `shutdown` flips to `true` or its sender is dropped.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.shared.settings.poll_interval;
        let mut next_tick = Instant::now();
        let mut in_flight: Option<JoinHandle<CycleReport>> = None;
        info!(interval_ms = interval.as_millis(), "live feed loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                joined = join_cycle(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if let Some(backoff) = self.settle(joined) {
                        next_tick += backoff;
                    }
                }
                () = sleep_until(next_tick) => {
                    next_tick = advance(next_tick, interval, Instant::now());
                    self.shared
                        .metrics
                        .set_live_subscribers(self.shared.registry.len());
                    match Arc::clone(&self.shared.cycle).try_lock_owned() {
                        Ok(state) => {
                            let shared = Arc::clone(&self.shared);
                            in_flight = Some(tokio::spawn(run_cycle(shared, state)));
                        }
                        Err(_) => {
                            debug!("previous cycle still running; tick skipped");
                            self.shared.metrics.inc_cycle(CycleOutcome::Skipped);
                        }
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            let _ = self.settle(handle.await);
        }
        info!("live feed loop stopped");
    }

    fn settle(&self, joined: Result<CycleReport, JoinError>) -> Option<Duration> {
        match joined {
            Ok(report) => {
                self.shared.metrics.inc_cycle(report.outcome);
                report.backoff
            }
            Err(err) => {
                warn!(error = %err, "live feed cycle task aborted");
                self.shared.metrics.inc_cycle(CycleOutcome::Failed);
                Some(self.shared.settings.backoff_unit)
            }
        }
    }
}

async fn join_cycle(slot: &mut Option<JoinHandle<CycleReport>>) -> Result<CycleReport, JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// First deadline after `now` on the fixed grid that starts at `previous`.
fn advance(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    while next <= now {
        next += interval;
    }
    next
}

async fn run_cycle(shared: Arc<Shared>, mut state: OwnedMutexGuard<CycleState>) -> CycleReport {
    if !shared.registry.has_any() {
        if state.last_snapshot.take().is_some() {
            debug!("no subscribers left; forgetting last snapshot");
        }
        shared.registry.forget_latest();
        return CycleReport::settled(CycleOutcome::Idle);
    }

    match shared.poll(&mut state).await {
        Ok(snapshot) => {
            if state.failures > 0 {
                info!(failures = state.failures, "live feed recovered");
            }
            state.failures = 0;
            shared.metrics.reset_consecutive_failures();
            if state.last_snapshot.as_ref() == Some(&snapshot) {
                return CycleReport::settled(CycleOutcome::Unchanged);
            }
            let message = LiveMessage::TorrentsSnapshot {
                torrents: snapshot.clone(),
            };
            let report = shared.registry.broadcast(&message).await;
            shared.metrics.record_broadcast(report.dropped);
            debug!(
                torrents = snapshot.len(),
                delivered = report.delivered,
                dropped = report.dropped,
                "snapshot broadcast"
            );
            state.last_snapshot = Some(snapshot);
            CycleReport::settled(CycleOutcome::Broadcast)
        }
        Err(err) => {
            state.failures = state.failures.saturating_add(1);
            let backoff = backoff_delay(
                state.failures,
                shared.settings.backoff_unit,
                shared.settings.max_backoff,
            );
            warn!(
                error = %err,
                failures = state.failures,
                backoff_ms = backoff.as_millis(),
                "live feed cycle failed"
            );
            shared.metrics.record_daemon_failure(state.failures);
            CycleReport {
                outcome: CycleOutcome::Failed,
                backoff: Some(backoff),
            }
        }
    }
}

impl Shared {
    async fn poll(&self, state: &mut CycleState) -> TorrentResult<Vec<TorrentView>> {
        self.refresh_records(state).await?;
        let live = self.daemon.list_transfers().await?;
        Ok(build_snapshot(&state.records, &live))
    }

    async fn refresh_records(&self, state: &mut CycleState) -> TorrentResult<()> {
        let expired = state
            .records_loaded_at
            .is_none_or(|loaded| loaded.elapsed() >= self.settings.records_refresh);
        let flagged = self.records_stale.swap(false, Ordering::AcqRel);
        if !expired && !flagged {
            return Ok(());
        }
        match self.store.list_all().await {
            Ok(records) => {
                state.records = records;
                state.records_loaded_at = Some(Instant::now());
                Ok(())
            }
            Err(err) => {
                self.records_stale.store(true, Ordering::Release);
                Err(err)
            }
        }
    }
}
