/// Application state and router assembly.
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use ninjax_downloader::{DownloaderSettings, Downloaders};
use ninjax_shared::cookies::CookieStore;
use ninjax_shared::errors::NinjaResult;
use ninjax_shared::job_slots::JobSlots;

use crate::config::Config;
use crate::rate_limit::{self, RateLimits, Scope, ScopedLimit};
use crate::routes;
use crate::security;

/// Shared application state for all API handlers.
pub struct AppState {
    pub config: Config,
    pub downloaders: Downloaders,
    pub slots: JobSlots,
    pub limits: Arc<RateLimits>,
}

impl AppState {
    pub fn new(config: Config) -> NinjaResult<Self> {
        let cookies = CookieStore::load(&config.cookies_dir);
        info!("Cookie files loaded for: {:?}", cookies.platforms());

        let settings = DownloaderSettings {
            ytdlp_bin: config.ytdlp_bin.clone(),
            timeout_secs: config.extractor_timeout_secs,
            download_dir: config.download_dir.clone(),
            max_download_bytes: config.max_content_length,
        };

        Ok(Self {
            downloaders: Downloaders::new(&settings, &cookies)?,
            slots: JobSlots::new(config.max_concurrent_downloads),
            limits: Arc::new(RateLimits::from_config(&config)),
            config,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let limited = |scope: Scope| {
        middleware::from_fn_with_state(
            ScopedLimit::new(state.limits.clone(), scope),
            rate_limit::enforce,
        )
    };

    let info_routes = Router::new()
        .route("/api/youtube/info", post(routes::youtube_info))
        .route("/api/instagram/info", post(routes::instagram_info))
        .route("/api/facebook/info", post(routes::facebook_info))
        .route("/api/jiosaavn/search", post(routes::jiosaavn_search))
        .route("/api/spotify/info", post(routes::spotify_info))
        .route_layer(limited(Scope::Info));

    let download_routes = Router::new()
        .route("/api/youtube/download", post(routes::youtube_download))
        .route("/api/instagram/download", post(routes::instagram_download))
        .route("/api/facebook/download", post(routes::facebook_download))
        .route("/api/spotify/download", post(routes::spotify_download))
        .route_layer(limited(Scope::Download));

    let default_routes = Router::new()
        .route("/", get(routes::index))
        .route("/api/download/*filename", get(routes::download_file))
        .route_layer(limited(Scope::Default));

    // Health is registered after the route layers so it is never limited.
    let router = Router::new()
        .merge(info_routes)
        .merge(download_routes)
        .merge(default_routes)
        .route("/health", get(routes::health))
        .fallback(routes::not_found)
        .with_state(state.clone());

    let max_body = usize::try_from(state.config.max_content_length).unwrap_or(usize::MAX);
    security::harden(router, max_body)
        .layer(security::cors())
        .layer(TraceLayer::new_for_http())
}
