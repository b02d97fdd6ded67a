/// API route handlers for Downloader NinjaX.
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use ninjax_downloader::link::{is_platform, normalize_spotify_uri};
use ninjax_shared::job_slots::JobKind;
use ninjax_shared::models::{
    DownloadResult, HealthReport, MediaInfo, Platform, SongResult, TrackInfo, VideoInfo,
};
use ninjax_shared::validation::{sanitize_filename, validate_url};

use crate::app::AppState;
use crate::errors::ApiError;

// ====== REQUEST / RESPONSE TYPES ======

#[derive(Deserialize)]
pub struct UrlBody {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct YoutubeDownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub query: Option<String>,
}

/// `{"success": true, ...data}`
#[derive(Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Serialize)]
pub struct SearchResults {
    pub results: Vec<SongResult>,
}

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Success { success: true, data }))
}

/// Trimmed, non-empty `url` field.
fn required_url(body: Option<Json<UrlBody>>) -> Result<String, ApiError> {
    body.and_then(|Json(b)| b.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))
}

/// Validated URL that must belong to `platform`.
fn platform_url(url: String, platform: Platform) -> Result<String, ApiError> {
    let url = if platform == Platform::Spotify {
        normalize_spotify_uri(&url)
    } else {
        url
    };
    validate_url(&url)?;
    if !is_platform(&url, platform) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {} URL",
            platform.display_name()
        )));
    }
    Ok(url)
}

// ====== INDEX / HEALTH ======

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Downloader NinjaX API</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; background: #f5f5f5; }
        .container { max-width: 800px; margin: 0 auto; background: white; padding: 20px; border-radius: 10px; }
        h1 { color: #333; text-align: center; }
        .endpoint { background: #f8f9fa; padding: 15px; margin: 10px 0; border-radius: 5px; }
        code { background: #e9ecef; padding: 2px 4px; border-radius: 3px; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Downloader NinjaX API</h1>
        <p>Fast, secure, and reliable video/audio downloader API</p>

        <h2>Available Endpoints:</h2>

        <div class="endpoint">
            <h3>YouTube</h3>
            <p><strong>Get Info:</strong> <code>POST /api/youtube/info</code></p>
            <p><strong>Download:</strong> <code>POST /api/youtube/download</code></p>
        </div>

        <div class="endpoint">
            <h3>Instagram</h3>
            <p><strong>Get Info:</strong> <code>POST /api/instagram/info</code></p>
            <p><strong>Download:</strong> <code>POST /api/instagram/download</code></p>
        </div>

        <div class="endpoint">
            <h3>Facebook</h3>
            <p><strong>Get Info:</strong> <code>POST /api/facebook/info</code></p>
            <p><strong>Download:</strong> <code>POST /api/facebook/download</code></p>
        </div>

        <h2>Usage:</h2>
        <p>Send POST requests with JSON body containing the URL:</p>
        <pre><code>{"url": "https://www.youtube.com/watch?v=VIDEO_ID"}</code></pre>
    </div>
</body>
</html>
"#;

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        downloads: state.slots.stats(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found")
}

// ====== YOUTUBE ======

/// POST /api/youtube/info
pub async fn youtube_info(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<VideoInfo> {
    let url = platform_url(required_url(body)?, Platform::Youtube)?;
    info!("YouTube info requested");

    let video = state
        .slots
        .run(Platform::Youtube, JobKind::Info, state.downloaders.youtube.info(&url))
        .await?;
    ok(video)
}

/// POST /api/youtube/download
pub async fn youtube_download(
    State(state): State<Arc<AppState>>,
    body: Option<Json<YoutubeDownloadBody>>,
) -> ApiResult<DownloadResult> {
    let missing = || ApiError::BadRequest("Missing required parameters".to_string());
    let Json(body) = body.ok_or_else(missing)?;
    let (Some(url), Some(format_id), Some(quality)) = (body.url, body.format_id, body.quality) else {
        return Err(missing());
    };

    let url = platform_url(url.trim().to_string(), Platform::Youtube)?;
    info!("YouTube download requested (format={}, quality={})", format_id, quality);

    let result = state
        .slots
        .run(
            Platform::Youtube,
            JobKind::Download,
            state.downloaders.youtube.download(&url, &format_id, &quality),
        )
        .await?;
    ok(result)
}

// ====== INSTAGRAM ======

/// POST /api/instagram/info
pub async fn instagram_info(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<MediaInfo> {
    let url = platform_url(required_url(body)?, Platform::Instagram)?;

    let media = state
        .slots
        .run(Platform::Instagram, JobKind::Info, state.downloaders.instagram.info(&url))
        .await?;
    ok(media)
}

/// POST /api/instagram/download
pub async fn instagram_download(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<DownloadResult> {
    let url = platform_url(required_url(body)?, Platform::Instagram)?;

    let result = state
        .slots
        .run(Platform::Instagram, JobKind::Download, state.downloaders.instagram.download(&url))
        .await?;
    ok(result)
}

// ====== FACEBOOK ======

/// POST /api/facebook/info
pub async fn facebook_info(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<MediaInfo> {
    let url = platform_url(required_url(body)?, Platform::Facebook)?;

    let media = state
        .slots
        .run(Platform::Facebook, JobKind::Info, state.downloaders.facebook.info(&url))
        .await?;
    ok(media)
}

/// POST /api/facebook/download
pub async fn facebook_download(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<DownloadResult> {
    let url = platform_url(required_url(body)?, Platform::Facebook)?;

    let result = state
        .slots
        .run(Platform::Facebook, JobKind::Download, state.downloaders.facebook.download(&url))
        .await?;
    ok(result)
}

// ====== JIOSAAVN / SPOTIFY ======

/// POST /api/jiosaavn/search
pub async fn jiosaavn_search(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SearchBody>>,
) -> ApiResult<SearchResults> {
    if !state.config.enable_jiosaavn {
        return Err(ApiError::FeatureDisabled);
    }
    let query = body
        .and_then(|Json(b)| b.query)
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query is required".to_string()))?;

    let results = state
        .slots
        .run(Platform::Jiosaavn, JobKind::Search, state.downloaders.jiosaavn.search(&query))
        .await?;
    ok(SearchResults { results })
}

/// POST /api/spotify/info
pub async fn spotify_info(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<TrackInfo> {
    if !state.config.enable_spotify {
        return Err(ApiError::FeatureDisabled);
    }
    let url = platform_url(required_url(body)?, Platform::Spotify)?;

    let track = state
        .slots
        .run(Platform::Spotify, JobKind::Info, state.downloaders.spotify.info(&url))
        .await?;
    ok(track)
}

/// POST /api/spotify/download
pub async fn spotify_download(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UrlBody>>,
) -> ApiResult<DownloadResult> {
    if !state.config.enable_spotify {
        return Err(ApiError::FeatureDisabled);
    }
    let url = platform_url(required_url(body)?, Platform::Spotify)?;

    let result = state
        .slots
        .run(Platform::Spotify, JobKind::Download, state.downloaders.spotify.download(&url))
        .await?;
    ok(result)
}

// ====== FILES ======

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "mkv" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// GET /api/download/*filename - Serve a downloaded file as an attachment
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let safe_name = sanitize_filename(&filename);
    if safe_name.is_empty() {
        return Err(ApiError::NotFound("File not found"));
    }

    let base = tokio::fs::canonicalize(&state.config.download_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Download folder unavailable: {}", e)))?;
    let path = tokio::fs::canonicalize(base.join(&safe_name))
        .await
        .map_err(|_| ApiError::NotFound("File not found"))?;

    if !path.starts_with(&base) {
        return Err(ApiError::Forbidden);
    }
    if !path.is_file() {
        return Err(ApiError::NotFound("File not found"));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot open file: {}", e)))?;
    let body = Body::from_stream(ReaderStream::new(file));

    info!("Serving {}", safe_name);
    let disposition = format!("attachment; filename=\"{}\"", safe_name.replace('"', "_"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&safe_name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("Downloader_NinjaX_1.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("clip.MP4"), "video/mp4");
        assert_eq!(content_type_for("post.jpg"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_required_url_trims() {
        let body = Json(UrlBody { url: Some("  https://youtu.be/x \n".into()) });
        assert_eq!(required_url(Some(body)).unwrap(), "https://youtu.be/x");
        assert!(required_url(None).is_err());
        assert!(required_url(Some(Json(UrlBody { url: Some("   ".into()) }))).is_err());
    }

    #[test]
    fn test_platform_url_rejects_other_platforms() {
        let err = platform_url("https://vimeo.com/123".into(), Platform::Youtube).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid YouTube URL"));
        assert!(platform_url("https://m.facebook.com/watch?v=1".into(), Platform::Facebook).is_ok());
    }

    #[test]
    fn test_spotify_uri_accepted() {
        let url = platform_url("spotify:track:4uLU6hMCjMI75M1A2tKUQC".into(), Platform::Spotify).unwrap();
        assert_eq!(url, "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC");

        // Only the Spotify routes rewrite URIs
        let err = platform_url("spotify:track:4uLU6hMCjMI75M1A2tKUQC".into(), Platform::Youtube).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
