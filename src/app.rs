use crate::cache::{CachedFetcher, DurableStore, DurableWriter, PgStore, TtlCache};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::saavn::SaavnApi;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How often expired in-process entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Trending preload waits for the listener to come up first.
const PRELOAD_DELAY: Duration = Duration::from_secs(2);

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    writer: Option<DurableWriter>,
    sweeper: JoinHandle<()>,
}

impl App {
    /// Create a new App instance with all necessary components initialized.
    ///
    /// A database that cannot be reached is not fatal; the service runs with
    /// the in-process cache only.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let saavn_api = SaavnApi::new_with_config(
            &config.saavn_api_url,
            config.retry_policy(),
            config.upstream_timeout,
        )
        .context("Failed to create SaavnApi")?;

        info!(
            base_url = %config.saavn_api_url,
            max_attempts = config.upstream_max_attempts,
            base_delay = fmt_duration(config.upstream_base_delay),
            cooldown = fmt_duration(config.upstream_cooldown),
            timeout = fmt_duration(config.upstream_timeout),
            "Saavn client configured"
        );

        let memory = TtlCache::new();
        let sweeper = memory.spawn_sweeper(SWEEP_INTERVAL);
        let mut fetcher = CachedFetcher::new(memory);

        let mut writer = None;
        match config.database_url.as_deref() {
            Some(url) => match Self::connect_durable(url).await {
                Ok(store) => {
                    let store: Arc<dyn DurableStore> = Arc::new(store);
                    let durable_writer =
                        DurableWriter::spawn(store.clone(), config.durable_write_queue);
                    fetcher = fetcher.with_durable(store, durable_writer.clone());
                    writer = Some(durable_writer);
                }
                Err(e) => {
                    warn!(error = ?e, "Durable cache unavailable, continuing with in-process cache only");
                }
            },
            None => info!("DATABASE_URL not set, durable cache disabled"),
        }

        let catalog = Catalog::new(Arc::new(saavn_api), fetcher);

        Ok(App {
            config,
            app_state: AppState::new(catalog),
            writer,
            sweeper,
        })
    }

    /// Connect, migrate and tidy the durable store.
    async fn connect_durable(database_url: &str) -> Result<PgStore, anyhow::Error> {
        let connect_options = PgConnectOptions::from_str(database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(Duration::from_millis(500))
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let store = PgStore::new(db_pool);
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => info!(count = n, "Purged expired durable cache records"),
            Err(e) => warn!(error = ?e, "Failed to purge expired durable records (non-fatal)"),
        }
        Ok(store)
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Serve until SIGINT/SIGTERM, then drain within the shutdown timeout.
    pub async fn run(self) -> ExitCode {
        let catalog = self.app_state.catalog.clone();
        tokio::spawn(async move {
            tokio::time::sleep(PRELOAD_DELAY).await;
            if let Err(e) = catalog.preload_trending().await {
                warn!(error = %e, "Failed to preload trending songs");
            }
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, port = self.config.port, "Failed to bind web server");
                return ExitCode::FAILURE;
            }
        };
        info!(port = self.config.port, "web server listening");

        let router = create_router(self.app_state.clone());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let mut exit = ExitCode::SUCCESS;
        tokio::select! {
            _ = shutdown_signal() => {
                info!(timeout = fmt_duration(self.config.shutdown_timeout), "Shutdown signal received, draining");
                let _ = shutdown_tx.send(());
                match tokio::time::timeout(self.config.shutdown_timeout, &mut server).await {
                    Ok(Ok(Ok(()))) => info!("web server stopped"),
                    Ok(Ok(Err(e))) => {
                        error!(error = %e, "web server failed while draining");
                        exit = ExitCode::FAILURE;
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "web server task panicked");
                        exit = ExitCode::FAILURE;
                    }
                    Err(_) => {
                        warn!("Graceful shutdown timed out, aborting open connections");
                        server.abort();
                    }
                }
            }
            result = &mut server => {
                error!(result = ?result, "web server exited unexpectedly");
                exit = ExitCode::FAILURE;
            }
        }

        if let Some(writer) = &self.writer
            && tokio::time::timeout(self.config.shutdown_timeout, writer.flush())
                .await
                .is_err()
        {
            warn!("Timed out flushing durable cache writes");
        }
        self.sweeper.abort();

        info!("shutdown complete");
        exit
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
