//! Startup wiring.
//!
//! [`Services::start`] builds every long-lived component in dependency
//! order: directories, media-server connection, library cache, database and
//! migrations, upstream client, then the apply pipeline.
//! [`Services::spawn_background`] starts the sweep, the upstream
//! subscription and the download queue under one [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use aura_core::config::{AppConfig, AppPaths};
use aura_core::library_cache::LibraryCache;
use aura_db::migrations::MigrationContext;
use aura_db::DbPool;
use aura_events::{NotificationDispatcher, TaskPool};
use aura_mediaserver::MediaServer;
use aura_mediux::client::MediuxWsClient;
use aura_mediux::{ImageCache, Mediux, MediuxApi};
use aura_pipeline::{ChangeDetector, Executor, LabelSync};
use aura_worker::{download_queue, warmer, SetUpdateConsumer, Sweep};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything the HTTP layer and the background tasks share.
pub struct Services {
    pub config: Arc<AppConfig>,
    pub paths: AppPaths,
    pub pool: DbPool,
    pub server: Arc<dyn MediaServer>,
    pub cache: Arc<LibraryCache>,
    pub mediux: Arc<Mediux>,
    pub detector: ChangeDetector,
}

impl Services {
    pub async fn start(config: Arc<AppConfig>, paths: AppPaths) -> anyhow::Result<Self> {
        for dir in paths.all_dirs() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        // --- Media server ---
        let server = aura_mediaserver::connect(&config.media_server)
            .context("Invalid media server configuration")?;
        match server.init_connection().await {
            Ok(()) => tracing::info!(server = server.server_type().as_str(), "Media server connected"),
            Err(e) => tracing::warn!(
                server = server.server_type().as_str(),
                error = %e,
                "Media server handshake failed; continuing",
            ),
        }

        // --- Library cache ---
        let cache = Arc::new(LibraryCache::new());
        let warmed =
            warmer::warm_libraries(server.as_ref(), &cache, &config.media_server.libraries).await;
        tracing::info!(
            warmed,
            configured = config.media_server.libraries.len(),
            "Library cache warmed"
        );

        // --- Database ---
        let pool = aura_db::create_pool(&paths.database())
            .await
            .context("Failed to open database")?;
        aura_db::health_check(&pool)
            .await
            .context("Database health check failed")?;
        let report = aura_db::run_migrations(
            &pool,
            &MigrationContext {
                paths: &paths,
                cache: &cache,
            },
        )
        .await
        .context("Failed to run database migrations")?;
        tracing::info!(
            from = report.from_version,
            to = report.to_version,
            converted = report.converted,
            warnings = report.warnings.len(),
            "Database ready"
        );

        // --- MediUX ---
        let api = MediuxApi::new(config.mediux.token.clone())
            .context("Failed to build MediUX client")?;
        match api.validate_token().await {
            Ok(true) => tracing::info!("MediUX token accepted"),
            Ok(false) => tracing::warn!("MediUX token rejected"),
            Err(e) => tracing::warn!(error = %e, "MediUX unreachable at startup"),
        }
        let image_cache = ImageCache::from_paths(&paths, config.images.cache_images.enabled);
        let mediux = Arc::new(Mediux::new(
            api,
            image_cache,
            config.mediux.download_quality.into(),
        ));

        // --- Pipeline ---
        let tasks = TaskPool::default();
        let labels = LabelSync::from_config(
            server.clone(),
            config.labels_and_tags.clone(),
            &config.sonarr_radarr,
        );
        let notifications = NotificationDispatcher::from_config(&config.notifications);
        let executor = Executor::new(
            server.clone(),
            mediux.clone(),
            cache.clone(),
            tasks,
            paths.clone(),
        )
        .with_images(
            config.images.clone(),
            config.media_server.season_naming_convention,
        )
        .with_notifications(notifications)
        .with_labels(labels);
        let detector = ChangeDetector::new(pool.clone(), executor);

        Ok(Self {
            config,
            paths,
            pool,
            server,
            cache,
            mediux,
            detector,
        })
    }

    /// Spawn every background task. They all stop when `cancel` fires.
    pub fn spawn_background(&self, cancel: &CancellationToken) -> Vec<(&'static str, JoinHandle<()>)> {
        let mut handles = Vec::new();

        if self.config.auto_download.enabled {
            let sweep = Arc::new(Sweep::new(
                self.pool.clone(),
                self.detector.clone(),
                self.config.media_server.libraries.clone(),
            ));
            handles.push((
                "sweep",
                tokio::spawn(sweep.run(self.config.auto_download.cron.clone(), cancel.clone())),
            ));
        } else {
            tracing::info!("Auto download disabled; cron sweep not started");
        }

        let consumer = Arc::new(SetUpdateConsumer::new(
            self.pool.clone(),
            self.detector.clone(),
        ));
        handles.push((
            "mediux_subscription",
            aura_mediux::subscription::spawn_subscription(
                MediuxWsClient::from_api(self.mediux.api()),
                consumer,
                cancel.clone(),
            ),
        ));

        handles.push((
            "download_queue",
            tokio::spawn(download_queue::run(
                self.detector.clone(),
                self.paths.download_queue(),
                cancel.clone(),
            )),
        ));

        handles
    }
}

/// Wait up to `timeout` for each background task to finish.
pub async fn join_background(handles: Vec<(&'static str, JoinHandle<()>)>, timeout: Duration) {
    for (name, handle) in handles {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task panicked"),
            Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
        }
    }
}
