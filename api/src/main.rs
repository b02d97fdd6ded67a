/// Downloader NinjaX API Server
///
/// REST API that fetches metadata and downloads media from YouTube,
/// Instagram and Facebook (plus optional JioSaavn search and Spotify tracks).
mod app;
mod cleanup;
mod config;
mod errors;
mod rate_limit;
mod routes;
mod security;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .init();

    debug!("Configuration: {:?}", config);
    if config.secret_key_generated && config.is_production() {
        warn!("SECRET_KEY is not set");
    }

    for dir in [&config.download_dir, &config.temp_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }
    info!("Download folder: {:?}", config.download_dir);

    let state = Arc::new(AppState::new(config)?);

    // Initial sweep, then periodic cleanup
    let sweep_dirs = vec![state.config.download_dir.clone(), state.config.temp_dir.clone()];
    let retention = Duration::from_secs(state.config.file_retention_secs);
    let removed = cleanup::sweep(&sweep_dirs, retention).await;
    info!("Startup cleanup removed {} files", removed);

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let period = Duration::from_secs(cleanup_state.config.cleanup_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cleanup::sweep(&sweep_dirs, retention).await;
            let keys = cleanup_state.limits.prune();
            let jobs = cleanup_state
                .slots
                .cleanup_old(cleanup_state.config.file_retention_secs as i64);
            if removed > 0 || jobs > 0 {
                info!("Cleanup: {} files, {} job records removed", removed, jobs);
            }
            debug!("Rate limiter tracks {} keys", keys);
        }
    });

    let app = app::build_router(state.clone());

    // Bind
    let addr = state.config.bind_addr();
    info!("Downloader NinjaX API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
