//! Lazily created, shared daemon session.

use std::sync::Arc;

use reqwest::header::{REFERER, SET_COOKIE};
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::QbitError;

const LOGIN_PATH: &str = "api/v2/auth/login";
const SESSION_COOKIE: &str = "SID";
const LOGIN_FAILED_BODY: &str = "Fails.";

/// Credentials used to (re)establish a session.
pub(crate) struct Credentials<'a> {
    pub(crate) base_url: &'a Url,
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

/// Holds the current `SID` cookie, if any.
#[derive(Default)]
pub(crate) struct DaemonSession {
    current: Mutex<Option<Arc<str>>>,
}

impl DaemonSession {
    /// Current session cookie, logging in first when none exists.
    pub(crate) async fn cookie(
        &self,
        http: &Client,
        credentials: &Credentials<'_>,
    ) -> Result<Arc<str>, QbitError> {
        let mut current = self.current.lock().await;
        if let Some(sid) = current.as_ref() {
            return Ok(Arc::clone(sid));
        }
        let sid: Arc<str> = login(http, credentials).await?.into();
        info!("daemon session established");
        *current = Some(Arc::clone(&sid));
        Ok(sid)
    }

    /// Drop the session if it is still the one that failed.
    ///
    /// A session rebuilt concurrently by another caller is left in place.
    pub(crate) async fn discard(&self, stale: Option<&str>) {
        let mut current = self.current.lock().await;
        if stale.is_none() || current.as_deref() == stale {
            debug!("discarding daemon session");
            *current = None;
        }
    }
}

async fn login(http: &Client, credentials: &Credentials<'_>) -> Result<String, QbitError> {
    let url = credentials
        .base_url
        .join(LOGIN_PATH)
        .map_err(|source| QbitError::Endpoint {
            path: LOGIN_PATH,
            source,
        })?;
    let response = http
        .post(url)
        .header(REFERER, credentials.base_url.as_str())
        .form(&[
            ("username", credentials.username),
            ("password", credentials.password),
        ])
        .send()
        .await
        .map_err(|source| QbitError::Transport { source })?;

    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(QbitError::Unauthorized {
            status: status.as_u16(),
        });
    }
    let sid = session_cookie(&response);
    let body = response
        .text()
        .await
        .map_err(|source| QbitError::Transport { source })?;
    if !status.is_success() || body.trim() == LOGIN_FAILED_BODY {
        return Err(QbitError::LoginRejected);
    }
    sid.ok_or(QbitError::MissingSessionCookie)
}

fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
