//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tormeta_telemetry::build_sha;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::accounts::{login, register};
use crate::http::auth::require_bearer;
use crate::http::constants::{HEADER_REQUEST_ID, MAX_METAINFO_BYTES};
use crate::http::health::{health, metrics, ping};
use crate::http::live::live_feed;
use crate::http::telemetry::HttpMetricsLayer;
use crate::http::torrents::handlers::{
    delete_torrent, get_torrent, get_torrent_by_hash, ingest_torrent, list_torrents,
    resume_torrent, stop_torrent, update_torrent,
};
use crate::state::{ApiDependencies, ApiState};

/// Multipart framing and text fields on top of the metainfo upload itself.
const INGEST_BODY_LIMIT: usize = MAX_METAINFO_BYTES + 64 * 1024;

/// Axum router wrapper that hosts the tormeta API.
pub struct ApiServer {
    router: Router,
    shutdown: watch::Receiver<bool>,
}

impl ApiServer {
    /// Build the router over `dependencies`; the server stops once `shutdown` turns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::UploadDir`] when the upload directory cannot be created.
    pub fn new(
        dependencies: ApiDependencies,
        shutdown: watch::Receiver<bool>,
    ) -> ApiServerResult<Self> {
        std::fs::create_dir_all(&dependencies.upload_dir).map_err(|source| {
            ApiServerError::UploadDir {
                path: dependencies.upload_dir.clone(),
                source,
            }
        })?;
        let telemetry = dependencies.metrics.clone();
        let state = Arc::new(ApiState::new(dependencies, shutdown.clone()));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                CONTENT_TYPE,
                AUTHORIZATION,
                HeaderName::from_static(HEADER_REQUEST_ID),
            ]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(tormeta_telemetry::propagate_request_id_layer())
            .layer(tormeta_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::public_routes()
            .merge(Self::torrent_routes(&state))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Ok(Self { router, shutdown })
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/ping", get(ping))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/ws/torrents", get(live_feed))
    }

    fn torrent_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_auth = middleware::from_fn_with_state(state.clone(), require_bearer);
        Router::new()
            .route(
                "/torrents",
                get(list_torrents)
                    .post(ingest_torrent)
                    .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT)),
            )
            .route("/torrents/by_info_hash/{hash}", get(get_torrent_by_hash))
            .route(
                "/torrents/{id}",
                get(get_torrent).patch(update_torrent).delete(delete_torrent),
            )
            .route("/torrents/{id}/stop", post(stop_torrent))
            .route("/torrents/{id}/resume", post(resume_torrent))
            .route_layer(require_auth)
    }

    /// Serve the API on `addr` until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the listener cannot bind and
    /// [`ApiServerError::Serve`] if the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(%addr, "starting api");
        let mut shutdown = self.shutdown;
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GOOD_TOKEN, TestApi};
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server(api: &TestApi) -> anyhow::Result<ApiServer> {
        Ok(ApiServer::new(
            api.dependencies(),
            api.shutdown.subscribe(),
        )?)
    }

    fn get_request(uri: &str, token: Option<&str>) -> anyhow::Result<Request<Body>> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(builder.body(Body::empty())?)
    }

    #[tokio::test]
    async fn public_routes_answer_without_a_token() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let response = server(&api)?
            .router()
            .oneshot(get_request("/ping", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
        Ok(())
    }

    #[tokio::test]
    async fn torrent_routes_require_a_bearer_token() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let router = server(&api)?.router();

        let anonymous = router
            .clone()
            .oneshot(get_request("/torrents", None)?)
            .await?;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let authorized = router
            .oneshot(get_request("/torrents/7", Some(GOOD_TOKEN))?)
            .await?;
        assert_eq!(authorized.status(), StatusCode::NOT_FOUND);

        let rendered = api.state.telemetry.render()?;
        assert!(rendered.contains("route=\"/torrents/{id}\""));
        Ok(())
    }

    #[tokio::test]
    async fn creates_missing_upload_dir() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let nested = api.upload_path().join("nested/uploads");
        let dependencies = ApiDependencies {
            upload_dir: nested.clone(),
            ..api.dependencies()
        };
        ApiServer::new(dependencies, api.shutdown.subscribe())?;
        assert!(nested.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn serve_returns_once_shutdown_is_signalled() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let server = server(&api)?;
        api.shutdown.send(true)?;
        server.serve("127.0.0.1:0".parse()?).await?;
        Ok(())
    }

    #[tokio::test]
    async fn occupied_address_is_a_bind_error() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
        let err = server(&api)?
            .serve(occupied.local_addr()?)
            .await
            .expect_err("address already in use");
        assert!(matches!(err, ApiServerError::Bind { .. }));
        Ok(())
    }
}
