//! qBittorrent client implementing [`TransferDaemon`].

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tokio::time::sleep;
use tormeta_torrent_core::{
    AddTransfer, InfoHash, LiveTransferStatus, RawTransfer, TorrentError, TorrentResult,
    TransferDaemon, TransferSource, parse_magnet,
};
use tracing::{debug, warn};

use crate::error::QbitError;
use crate::session::{Credentials, DaemonSession};

const INFO_PATH: &str = "api/v2/torrents/info";
const ADD_PATH: &str = "api/v2/torrents/add";
const CREATE_TAGS_PATH: &str = "api/v2/torrents/createTags";
const ADD_TAGS_PATH: &str = "api/v2/torrents/addTags";
const REMOVE_TAGS_PATH: &str = "api/v2/torrents/removeTags";
const PAUSE_PATH: &str = "api/v2/torrents/pause";
const STOP_PATH: &str = "api/v2/torrents/stop";
const RESUME_PATH: &str = "api/v2/torrents/resume";
const START_PATH: &str = "api/v2/torrents/start";
const DELETE_PATH: &str = "api/v2/torrents/delete";
const ADD_REFUSED: &str = "Fails.";

/// Connection settings for the daemon.
#[derive(Clone)]
pub struct QbitOptions {
    /// Web UI base URL, e.g. `http://127.0.0.1:8080`.
    pub base_url: Url,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Lookups made after adding a metainfo file with a known hash.
    pub add_poll_attempts: u32,
    /// Delay between those lookups.
    pub add_poll_delay: Duration,
}

impl Debug for QbitOptions {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("QbitOptions")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("add_poll_attempts", &self.add_poll_attempts)
            .field("add_poll_delay", &self.add_poll_delay)
            .finish()
    }
}

/// Shared handle to one qBittorrent instance.
///
/// Cloning is cheap; clones share the HTTP pool and the authenticated session.
#[derive(Clone)]
pub struct QbitClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    options: QbitOptions,
    session: DaemonSession,
}

enum AttemptError {
    Session {
        sid: Option<Arc<str>>,
        source: QbitError,
    },
    Rejected(StatusCode),
}

impl QbitClient {
    /// Build a client. No network traffic happens until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::ClientBuild`] when the HTTP client cannot be created.
    pub fn new(mut options: QbitOptions) -> Result<Self, QbitError> {
        if !options.base_url.path().ends_with('/') {
            let path = format!("{}/", options.base_url.path());
            options.base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| QbitError::ClientBuild { source })?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                options,
                session: DaemonSession::default(),
            }),
        })
    }

    /// Settings the client was built with.
    #[must_use]
    pub fn options(&self) -> &QbitOptions {
        &self.inner.options
    }

    fn endpoint(&self, path: &'static str) -> TorrentResult<Url> {
        self.inner
            .options
            .base_url
            .join(path)
            .map_err(|source| {
                TorrentError::daemon_unavailable(path, QbitError::Endpoint { path, source })
            })
    }

    /// Run a request, rebuilding the session once on auth or connection failure.
    async fn execute<F>(&self, operation: &'static str, build: F) -> TorrentResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut rebuilt = false;
        loop {
            match self.attempt(&build).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Rejected(status)) => {
                    debug!(operation, status = status.as_u16(), "daemon rejected request");
                    return Err(TorrentError::DaemonRejected {
                        operation,
                        status: status.as_u16(),
                    });
                }
                Err(AttemptError::Session { sid, source }) => {
                    self.inner.session.discard(sid.as_deref()).await;
                    if rebuilt {
                        warn!(operation, error = %source, "daemon unavailable after session rebuild");
                        return Err(TorrentError::daemon_unavailable(operation, source));
                    }
                    debug!(operation, error = %source, "rebuilding daemon session");
                    rebuilt = true;
                }
            }
        }
    }

    async fn attempt<F>(&self, build: &F) -> Result<Response, AttemptError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let options = &self.inner.options;
        let credentials = Credentials {
            base_url: &options.base_url,
            username: &options.username,
            password: &options.password,
        };
        let sid = self
            .inner
            .session
            .cookie(&self.inner.http, &credentials)
            .await
            .map_err(|source| AttemptError::Session { sid: None, source })?;

        let response = build(&self.inner.http)
            .header(COOKIE, format!("SID={sid}"))
            .header(REFERER, options.base_url.as_str())
            .send()
            .await
            .map_err(|source| AttemptError::Session {
                sid: Some(Arc::clone(&sid)),
                source: QbitError::Transport { source },
            })?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AttemptError::Session {
                sid: Some(sid),
                source: QbitError::Unauthorized {
                    status: status.as_u16(),
                },
            });
        }
        if !status.is_success() {
            return Err(AttemptError::Rejected(status));
        }
        Ok(response)
    }

    async fn fetch_transfers(
        &self,
        operation: &'static str,
        hash: Option<&InfoHash>,
    ) -> TorrentResult<Vec<LiveTransferStatus>> {
        let url = self.endpoint(INFO_PATH)?;
        let response = self
            .execute(operation, |http| {
                let request = http.get(url.clone());
                match hash {
                    Some(hash) => request.query(&[("hashes", hash.as_str())]),
                    None => request,
                }
            })
            .await?;
        let raw: Vec<RawTransfer> = response.json().await.map_err(|source| {
            TorrentError::daemon_unavailable(operation, QbitError::Decode { source })
        })?;

        Ok(raw
            .into_iter()
            .filter_map(|entry| match LiveTransferStatus::try_from(entry) {
                Ok(status) => Some(status),
                Err(err) => {
                    warn!(operation, error = %err, "skipping malformed daemon transfer entry");
                    None
                }
            })
            .collect())
    }

    async fn post_form(
        &self,
        operation: &'static str,
        path: &'static str,
        params: &[(&str, &str)],
    ) -> TorrentResult<()> {
        let url = self.endpoint(path)?;
        self.execute(operation, |http| http.post(url.clone()).form(params))
            .await
            .map(|_| ())
    }

    /// Post to `primary`, retrying against `renamed` when the daemon no longer
    /// knows the legacy endpoint.
    async fn post_form_with_fallback(
        &self,
        operation: &'static str,
        primary: &'static str,
        renamed: &'static str,
        params: &[(&str, &str)],
    ) -> TorrentResult<()> {
        match self.post_form(operation, primary, params).await {
            Err(TorrentError::DaemonRejected { status: 404, .. }) => {
                debug!(operation, endpoint = renamed, "falling back to renamed endpoint");
                self.post_form(operation, renamed, params).await
            }
            other => other,
        }
    }

    async fn await_visible(&self, hash: &InfoHash) -> Option<InfoHash> {
        let attempts = self.inner.options.add_poll_attempts;
        for attempt in 1..=attempts {
            match self.find_transfer(hash).await {
                Ok(Some(transfer)) => return Some(transfer.hash),
                Ok(None) => {}
                Err(err) => {
                    warn!(attempt, info_hash = %hash, error = %err, "daemon lookup after add failed");
                }
            }
            if attempt < attempts {
                sleep(self.inner.options.add_poll_delay).await;
            }
        }
        debug!(info_hash = %hash, attempts, "added transfer not yet visible");
        None
    }
}

/// What the add call uploads: a link the daemon fetches, or metainfo bytes.
enum AddPayload {
    Link(String),
    Metainfo { bytes: Vec<u8>, file_name: String },
}

impl AddPayload {
    async fn for_source(source: &TransferSource) -> TorrentResult<Self> {
        match source {
            TransferSource::Magnet(uri) | TransferSource::Url(uri) => Ok(Self::Link(uri.clone())),
            TransferSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| {
                    TorrentError::daemon_unavailable("qbit.add", QbitError::ReadFile { source })
                })?;
                let file_name = path.file_name().map_or_else(
                    || "upload.torrent".to_string(),
                    |name| name.to_string_lossy().into_owned(),
                );
                Ok(Self::Metainfo { bytes, file_name })
            }
        }
    }
}

fn add_form(request: &AddTransfer, payload: &AddPayload) -> Form {
    let mut form = match payload {
        AddPayload::Link(uri) => Form::new().text("urls", uri.clone()),
        AddPayload::Metainfo { bytes, file_name } => Form::new().part(
            "torrents",
            Part::bytes(bytes.clone()).file_name(file_name.clone()),
        ),
    };
    if let Some(save_path) = request.save_path.as_deref().filter(|path| !path.is_empty()) {
        form = form.text("savepath", save_path.to_string());
    }
    if !request.tags.is_empty() {
        form = form.text("tags", request.tags.join(","));
    }
    if let Some(category) = request.category.as_deref().filter(|value| !value.is_empty()) {
        form = form.text("category", category.to_string());
    }
    form
}

#[async_trait]
impl TransferDaemon for QbitClient {
    async fn list_transfers(&self) -> TorrentResult<Vec<LiveTransferStatus>> {
        self.fetch_transfers("qbit.list", None).await
    }

    async fn find_transfer(&self, hash: &InfoHash) -> TorrentResult<Option<LiveTransferStatus>> {
        let transfers = self.fetch_transfers("qbit.find", Some(hash)).await?;
        Ok(transfers
            .into_iter()
            .find(|transfer| transfer.hash == *hash))
    }

    async fn add_transfer(&self, request: AddTransfer) -> TorrentResult<Option<InfoHash>> {
        let payload = AddPayload::for_source(&request.source).await?;
        let url = self.endpoint(ADD_PATH)?;
        let response = self
            .execute("qbit.add", |http| {
                http.post(url.clone()).multipart(add_form(&request, &payload))
            })
            .await?;
        // The daemon answers 200 with `Fails.` when it refuses the transfer.
        let body = response.text().await.map_err(|source| {
            TorrentError::daemon_unavailable("qbit.add", QbitError::Decode { source })
        })?;
        if body.trim().eq_ignore_ascii_case(ADD_REFUSED) {
            debug!("daemon refused transfer");
            return Err(TorrentError::DaemonRejected {
                operation: "qbit.add",
                status: StatusCode::OK.as_u16(),
            });
        }

        match &request.source {
            TransferSource::Magnet(uri) => Ok(parse_magnet(uri)
                .map(|magnet| magnet.info_hash)
                .ok()
                .or(request.known_hash)
                .map(|hash| hash.transfer_id())),
            TransferSource::File(_) => match request.known_hash {
                Some(hash) => Ok(self.await_visible(&hash.transfer_id()).await),
                None => Ok(None),
            },
            TransferSource::Url(_) => Ok(request.known_hash.map(|hash| hash.transfer_id())),
        }
    }

    async fn set_tags(&self, hash: &InfoHash, tags: &[String]) -> TorrentResult<()> {
        let hashes = hash.as_str();
        self.post_form(
            "qbit.remove_tags",
            REMOVE_TAGS_PATH,
            &[("hashes", hashes), ("tags", "")],
        )
        .await?;
        if tags.is_empty() {
            return Ok(());
        }
        let joined = tags.join(",");
        self.post_form("qbit.create_tags", CREATE_TAGS_PATH, &[("tags", &joined)])
            .await?;
        self.post_form(
            "qbit.add_tags",
            ADD_TAGS_PATH,
            &[("hashes", hashes), ("tags", &joined)],
        )
        .await
    }

    async fn pause(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.post_form_with_fallback(
            "qbit.pause",
            PAUSE_PATH,
            STOP_PATH,
            &[("hashes", hash.as_str())],
        )
        .await
    }

    async fn resume(&self, hash: &InfoHash) -> TorrentResult<()> {
        self.post_form_with_fallback(
            "qbit.resume",
            RESUME_PATH,
            START_PATH,
            &[("hashes", hash.as_str())],
        )
        .await
    }

    async fn remove(&self, hash: &InfoHash, delete_files: bool) -> TorrentResult<()> {
        let delete_files = if delete_files { "true" } else { "false" };
        self.post_form(
            "qbit.delete",
            DELETE_PATH,
            &[("hashes", hash.as_str()), ("deleteFiles", delete_files)],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(base: &str) -> QbitOptions {
        QbitOptions {
            base_url: Url::parse(base).expect("valid url"),
            username: "admin".into(),
            password: "secret".into(),
            timeout: Duration::from_secs(1),
            add_poll_attempts: 1,
            add_poll_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn base_url_gains_trailing_slash_for_joins() {
        let client = QbitClient::new(options("http://nas.local:8080/qbt")).expect("client");
        let info = client.endpoint(INFO_PATH).expect("endpoint");
        assert_eq!(info.as_str(), "http://nas.local:8080/qbt/api/v2/torrents/info");
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", options("http://127.0.0.1:8080"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret"));
    }
}
