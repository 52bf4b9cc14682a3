//! Shared handler state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tormeta_config::BroadcastConfig;
use tormeta_events::ConnectionRegistry;
use tormeta_telemetry::Metrics;
use tormeta_torrent_core::{TorrentStore, TransferWorkflow};

use crate::identity::SharedIdentity;

/// Collaborators the binary wires into the API.
#[derive(Clone)]
pub struct ApiDependencies {
    /// Persisted torrent records.
    pub store: Arc<dyn TorrentStore>,
    /// Background daemon work.
    pub workflow: Arc<dyn TransferWorkflow>,
    /// Accounts and bearer tokens.
    pub identity: SharedIdentity,
    /// Live feed membership.
    pub registry: ConnectionRegistry,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// Directory receiving uploaded metainfo files.
    pub upload_dir: PathBuf,
    /// Live feed connection settings.
    pub live_feed: BroadcastConfig,
}

/// Per-connection live feed settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LiveFeedSettings {
    pub(crate) ping_interval: Duration,
    pub(crate) queue_capacity: usize,
    pub(crate) send_timeout: Duration,
}

impl From<BroadcastConfig> for LiveFeedSettings {
    fn from(config: BroadcastConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            queue_capacity: config.queue_capacity,
            send_timeout: config.send_timeout,
        }
    }
}

pub(crate) struct ApiState {
    pub(crate) store: Arc<dyn TorrentStore>,
    pub(crate) workflow: Arc<dyn TransferWorkflow>,
    pub(crate) identity: SharedIdentity,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) telemetry: Metrics,
    pub(crate) upload_dir: PathBuf,
    pub(crate) live_feed: LiveFeedSettings,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl ApiState {
    pub(crate) fn new(dependencies: ApiDependencies, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            store: dependencies.store,
            workflow: dependencies.workflow,
            identity: dependencies.identity,
            registry: dependencies.registry,
            telemetry: dependencies.metrics,
            upload_dir: dependencies.upload_dir,
            live_feed: dependencies.live_feed.into(),
            shutdown,
        }
    }
}
