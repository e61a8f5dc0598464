use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use aura_core::config::{config_dir_from_env, AppConfig, AppPaths};
use tokio_util::sync::CancellationToken;

use aura_api::bootstrap::{join_background, Services};
use aura_api::config::ServerConfig;
use aura_api::router::build_app_router;
use aura_api::state::AppState;
use aura_api::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    // Tracing depends on the logging section, so config errors go to stderr.
    let config_dir = config_dir_from_env();
    let config = match AppConfig::load_from_dir(&config_dir) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("aura: {e}");
            return ExitCode::FAILURE;
        }
    };
    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("aura: {e}");
            return ExitCode::FAILURE;
        }
    };

    // --- Tracing ---
    if let Err(e) = telemetry::init(&config.logging) {
        eprintln!("aura: failed to open log file: {e}");
        return ExitCode::FAILURE;
    }

    match run(config, AppPaths::new(config_dir), server_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Arc<AppConfig>, paths: AppPaths, server_config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %paths.config_dir.display(),
        media_server = config.media_server.server_type.as_str(),
        "Starting aura"
    );

    let services = Services::start(config, paths).await?;

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let handles = services.spawn_background(&cancel);

    // --- Router ---
    let state = AppState {
        pool: services.pool.clone(),
        config: Arc::new(server_config.clone()),
        media_server: services.server.clone(),
        cache: services.cache.clone(),
    };
    let app = build_app_router(state);

    // --- Start server ---
    let host: IpAddr = server_config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", server_config.host))?;
    let addr = SocketAddr::new(host, server_config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    join_background(
        handles,
        Duration::from_secs(server_config.shutdown_timeout_secs),
    )
    .await;
    services.pool.close().await;
    tracing::info!("Graceful shutdown complete");

    served.context("Server error")
}

/// Wait for SIGINT or SIGTERM.
///
/// If a handler cannot be installed that branch never completes, so the
/// other signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
