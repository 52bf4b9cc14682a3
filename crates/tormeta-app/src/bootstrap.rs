//! Service wiring and process lifecycle.
//!
//! # Design
//! - Configuration is read once; every collaborator is built from it before
//!   anything starts, so a bad setting fails fast.
//! - One `watch` channel carries shutdown to the broadcaster loop, the live
//!   connections, and the HTTP server.
//! - The broadcaster is joined after the server stops so an in-flight cycle
//!   finishes before the process exits.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tormeta_api::{ApiDependencies, ApiServer, SharedIdentity};
use tormeta_config::{AppConfig, IdentityService, LogFormatSetting};
use tormeta_data::{SqliteTorrentStore, UserStore, connect};
use tormeta_events::ConnectionRegistry;
use tormeta_qbit::{QbitClient, QbitOptions};
use tormeta_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tormeta_torrent_core::{TorrentStore, TransferDaemon, TransferWorkflow};
use tracing::{error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::error::{AppError, AppResult};
use crate::orchestrator::TransferOrchestrator;
use crate::resolver::HashResolver;

/// Dependencies required to bootstrap tormeta.
pub(crate) struct BootstrapDependencies {
    config: AppConfig,
}

impl BootstrapDependencies {
    /// Load settings from the process environment (and `.env`).
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            AppConfig::from_env().map_err(|err| AppError::config("app_config.from_env", err))?;
        Ok(Self { config })
    }
}

/// Fully constructed collaborators, ready to run.
pub(crate) struct Services {
    bind_addr: SocketAddr,
    feed: Broadcaster,
    api: ApiDependencies,
}

impl Services {
    /// Open the database and build the daemon client, live feed, and API collaborators.
    pub(crate) async fn build(config: &AppConfig) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let pool = connect(&config.database.url)
            .await
            .map_err(|err| AppError::data("pool.connect", err))?;
        let store: Arc<dyn TorrentStore> = Arc::new(SqliteTorrentStore::new(pool.clone()));
        let identity: SharedIdentity =
            Arc::new(IdentityService::new(UserStore::new(pool), config.auth));

        let daemon_settings = &config.daemon;
        let client = QbitClient::new(QbitOptions {
            base_url: daemon_settings.host.clone(),
            username: daemon_settings.username.clone(),
            password: daemon_settings.password.clone(),
            timeout: daemon_settings.timeout,
            add_poll_attempts: daemon_settings.add_poll_attempts,
            add_poll_delay: daemon_settings.add_poll_delay,
        })
        .map_err(|err| AppError::daemon("qbit.client", err))?;
        let daemon: Arc<dyn TransferDaemon> = Arc::new(client);

        let registry = ConnectionRegistry::new();
        let feed = Broadcaster::new(
            registry.clone(),
            Arc::clone(&daemon),
            Arc::clone(&store),
            metrics.clone(),
            config.broadcast,
        );
        let resolver = HashResolver::new(
            Arc::clone(&daemon),
            Arc::clone(&store),
            feed.clone(),
            daemon_settings.resolve_retries,
            daemon_settings.resolve_delay,
        );
        let workflow: Arc<dyn TransferWorkflow> = Arc::new(TransferOrchestrator::new(
            daemon,
            Arc::clone(&store),
            resolver,
            feed.clone(),
        ));

        Ok(Self {
            bind_addr: config.http.bind_addr,
            feed,
            api: ApiDependencies {
                store,
                workflow,
                identity,
                registry,
                metrics,
                upload_dir: config.http.upload_dir.clone(),
                live_feed: config.broadcast,
            },
        })
    }

    /// Run the live feed and the API until `stop` resolves or the server fails.
    pub(crate) async fn run<F>(self, stop: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = self.feed.spawn(shutdown_rx.clone());
        let api = ApiServer::new(self.api, shutdown_rx)
            .map_err(|err| AppError::api_server("api_server.new", err))?;

        info!(addr = %self.bind_addr, "launching api listener");
        let serve = api.serve(self.bind_addr);
        tokio::pin!(serve);
        let served = tokio::select! {
            result = &mut serve => result,
            () = stop => {
                info!("shutdown requested");
                let _ = shutdown_tx.send(true);
                serve.await
            }
        };

        let _ = shutdown_tx.send(true);
        if let Err(err) = feed_task.await {
            warn!(error = %err, "broadcaster task join failed");
        }
        served.map_err(|err| AppError::api_server("api_server.serve", err))
    }
}

fn logging_config(config: &AppConfig) -> LoggingConfig<'_> {
    let format = match config.logging.format {
        LogFormatSetting::Auto => LogFormat::infer(),
        LogFormatSetting::Json => LogFormat::Json,
        LogFormatSetting::Pretty => LogFormat::Pretty,
    };
    LoggingConfig {
        level: &config.logging.level,
        format,
        ..LoggingConfig::default()
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}

/// Entry point for the tormeta boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, dependency construction, or the API
/// server fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies, interrupted())).await
}

/// Boot sequence over injected dependencies and stop signal.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, stop: F) -> AppResult<()>
where
    F: Future<Output = ()>,
{
    let BootstrapDependencies { config } = dependencies;
    tormeta_telemetry::init_logging(&logging_config(&config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("tormeta");
    info!(
        daemon = %config.daemon.host,
        database = %config.database.url,
        "tormeta bootstrap starting"
    );

    let services = Services::build(&config).await?;
    let result = services.run(stop).await;
    match &result {
        Ok(()) => info!("tormeta stopped"),
        Err(err) => error!(error = %err, "tormeta stopped with an error"),
    }
    result
}
