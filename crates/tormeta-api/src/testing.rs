//! In-crate fakes for handler tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{Request, header::CONTENT_TYPE};
use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use tokio::sync::watch;
use tormeta_config::{
    Account, BroadcastConfig, ConfigError, ConfigResult, Identity, IssuedToken, Registration,
};
use tormeta_events::ConnectionRegistry;
use tormeta_telemetry::Metrics;
use tormeta_test_support::MemoryStore;
use tormeta_torrent_core::{
    InfoHash, TorrentError, TorrentRecord, TorrentResult, TransferWorkflow,
};

use crate::identity::IdentityFacade;
use crate::state::{ApiDependencies, ApiState};

pub(crate) const GOOD_TOKEN: &str = "7f3a.secret";
pub(crate) const METAINFO: &[u8] = b"d8:announce3:url4:infod4:name3:fooee";
const BOUNDARY: &str = "tormeta-boundary";

/// Accepts `alice`/`secret` and the single token [`GOOD_TOKEN`].
pub(crate) struct StubIdentity;

#[async_trait]
impl IdentityFacade for StubIdentity {
    async fn register(&self, registration: Registration) -> ConfigResult<Account> {
        if registration.username.trim().is_empty() {
            return Err(ConfigError::InvalidRegistration {
                field: "username",
                reason: "empty",
            });
        }
        if registration.username == "alice" {
            return Err(ConfigError::UsernameTaken {
                username: registration.username,
            });
        }
        Ok(Account {
            id: 2,
            username: registration.username,
            email: registration.email,
            is_active: true,
            is_admin: false,
        })
    }

    async fn login(&self, username: &str, password: &str) -> ConfigResult<IssuedToken> {
        if username == "alice" && password == "secret" {
            return Ok(IssuedToken {
                access_token: GOOD_TOKEN.to_string(),
                token_type: "bearer",
                expires_at: Utc::now() + ChronoDuration::hours(1),
            });
        }
        Err(ConfigError::InvalidCredentials)
    }

    async fn verify_token(&self, token: &str) -> ConfigResult<Identity> {
        match token {
            GOOD_TOKEN => Ok(Identity {
                user_id: 1,
                username: "alice".to_string(),
            }),
            "expired" => Err(ConfigError::TokenExpired),
            _ => Err(ConfigError::TokenInvalid),
        }
    }
}

/// Workflow double that records every call instead of talking to a daemon.
#[derive(Default)]
pub(crate) struct RecordingWorkflow {
    submitted: Mutex<Vec<TorrentRecord>>,
    tag_syncs: Mutex<Vec<TorrentRecord>>,
    controls: Mutex<Vec<(&'static str, InfoHash)>>,
    changes: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingWorkflow {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn submitted(&self) -> Vec<TorrentRecord> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn tag_syncs(&self) -> Vec<TorrentRecord> {
        self.tag_syncs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn controls(&self) -> Vec<(&'static str, InfoHash)> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn changes(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }

    fn control(&self, action: &'static str, hash: &InfoHash) -> TorrentResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TorrentError::DaemonRejected {
                operation: action,
                status: 500,
            });
        }
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((action, hash.clone()));
        Ok(())
    }
}

#[async_trait]
impl TransferWorkflow for RecordingWorkflow {
    async fn submit(&self, record: TorrentRecord) -> TorrentResult<()> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn sync_tags(&self, record: TorrentRecord) -> TorrentResult<()> {
        self.tag_syncs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.control("pause", hash)
    }

    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.control("resume", hash)
    }

    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()> {
        self.control(if delete_files { "delete" } else { "remove" }, hash)
    }

    fn records_changed(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn live_feed_config() -> BroadcastConfig {
    BroadcastConfig {
        poll_interval: Duration::from_secs(3),
        backoff_unit: Duration::from_secs(5),
        max_backoff: Duration::from_secs(30),
        records_refresh: Duration::from_secs(30),
        ping_interval: Duration::from_secs(15),
        queue_capacity: 4,
        send_timeout: Duration::from_secs(1),
    }
}

/// Handler state over in-memory collaborators.
pub(crate) struct TestApi {
    pub(crate) state: Arc<ApiState>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) workflow: Arc<RecordingWorkflow>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) uploads: TempDir,
}

impl TestApi {
    pub(crate) fn new() -> anyhow::Result<Self> {
        Self::with_store(MemoryStore::new())
    }

    pub(crate) fn with_store(store: MemoryStore) -> anyhow::Result<Self> {
        let uploads = tempfile::tempdir()?;
        let store = Arc::new(store);
        let workflow = Arc::new(RecordingWorkflow::default());
        let registry = ConnectionRegistry::new();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let dependencies = ApiDependencies {
            store: store.clone(),
            workflow: workflow.clone(),
            identity: Arc::new(StubIdentity),
            registry: registry.clone(),
            metrics: Metrics::new()?,
            upload_dir: uploads.path().to_path_buf(),
            live_feed: live_feed_config(),
        };
        Ok(Self {
            state: Arc::new(ApiState::new(dependencies, shutdown_rx)),
            store,
            workflow,
            registry,
            shutdown,
            uploads,
        })
    }

    pub(crate) fn dependencies(&self) -> ApiDependencies {
        ApiDependencies {
            store: self.store.clone(),
            workflow: self.workflow.clone(),
            identity: Arc::new(StubIdentity),
            registry: self.registry.clone(),
            metrics: self.state.telemetry.clone(),
            upload_dir: self.upload_path(),
            live_feed: live_feed_config(),
        }
    }

    pub(crate) fn upload_path(&self) -> PathBuf {
        self.uploads.path().to_path_buf()
    }
}

fn multipart_body(text_fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in text_fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/x-bittorrent\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Multipart extractor over a hand-built `multipart/form-data` body.
pub(crate) async fn multipart(
    text_fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> anyhow::Result<Multipart> {
    let request = Request::builder()
        .method("POST")
        .uri("/torrents")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(text_fields, file)))?;
    Multipart::from_request(request, &())
        .await
        .map_err(|err| anyhow::anyhow!("multipart rejected: {err}"))
}
