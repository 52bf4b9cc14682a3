//! In-memory membership of live-feed subscribers.
//!
//! # Design
//! - A single mutex guards membership and the most recently broadcast frame.
//! - `broadcast` copies the member list under the lock and sends with it released,
//!   so a slow subscriber never blocks joins or leaves.
//! - Sends run concurrently; members whose send fails are removed after the pass.
//!   Failures are counted in the report and never surface as errors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::payloads::{Frame, LiveMessage};
use crate::subscriber::Subscriber;

/// Identifier handed out when a subscriber joins.
pub type SubscriberId = u64;

/// Outcome of a single broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the frame.
    pub delivered: usize,
    /// Subscribers removed because their send failed.
    pub dropped: usize,
}

struct Member {
    id: SubscriberId,
    subscriber: Arc<dyn Subscriber>,
}

#[derive(Default)]
struct Membership {
    members: Vec<Member>,
    latest: Option<Frame>,
}

/// Shared registry of connected subscribers.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    state: Mutex<Membership>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        self.add_seeded(subscriber, |_| {})
    }

    /// Register a subscriber and hand the most recent broadcast frame to `seed`.
    ///
    /// `seed` runs while membership is locked, so no broadcast can reach the new
    /// subscriber before the seed frame does. It must not block.
    pub fn add_seeded<F>(&self, subscriber: Arc<dyn Subscriber>, seed: F) -> SubscriberId
    where
        F: FnOnce(&Frame),
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.lock();
        if let Some(latest) = state.latest.as_ref() {
            seed(latest);
        }
        state.members.push(Member { id, subscriber });
        debug!(subscriber_id = id, members = state.members.len(), "subscriber joined");
        id
    }

    /// Remove a subscriber. Returns `true` when it was still registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut state = self.lock();
        let before = state.members.len();
        state.members.retain(|member| member.id != id);
        let removed = state.members.len() != before;
        if removed {
            debug!(subscriber_id = id, members = state.members.len(), "subscriber left");
        }
        removed
    }

    /// Whether anyone is currently listening.
    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.lock().members.is_empty()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_any()
    }

    /// Drop the remembered frame so late joiners are not seeded with stale content.
    pub fn forget_latest(&self) {
        self.lock().latest = None;
    }

    /// Send `message` to every current subscriber.
    pub async fn broadcast(&self, message: &LiveMessage) -> BroadcastReport {
        let frame = match Frame::encode(message) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, kind = message.kind(), "dropping unencodable live message");
                return BroadcastReport::default();
            }
        };
        self.broadcast_frame(frame).await
    }

    /// Send an already encoded frame to every current subscriber.
    pub async fn broadcast_frame(&self, frame: Frame) -> BroadcastReport {
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = {
            let mut state = self.lock();
            state.latest = Some(frame.clone());
            state
                .members
                .iter()
                .map(|member| (member.id, Arc::clone(&member.subscriber)))
                .collect()
        };

        let outcomes = join_all(targets.into_iter().map(|(id, subscriber)| {
            let frame = frame.clone();
            async move { (id, subscriber.deliver(frame).await) }
        }))
        .await;

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(subscriber_id = id, error = %err, "removing unresponsive subscriber");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut state = self.lock();
            state.members.retain(|member| !failed.contains(&member.id));
        }
        report.dropped = failed.len();
        report
    }

    fn lock(&self) -> MutexGuard<'_, Membership> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
