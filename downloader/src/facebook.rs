/// Facebook videos, found by scanning the page HTML for video sources.
use std::path::PathBuf;

use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use ninjax_shared::errors::{MediaError, NinjaResult};
use ninjax_shared::models::{file_stem, DownloadResult, MediaInfo};

use crate::fetch::HttpFetcher;

/// First `src` of a `<video>` or `<source>` element that points at a video.
pub fn extract_video_src(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("video, source").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .find(|src| src.contains("video"))
        .map(str::to_string)
}

pub struct FacebookDownloader {
    fetcher: HttpFetcher,
    download_dir: PathBuf,
    max_bytes: u64,
}

impl FacebookDownloader {
    pub fn new(fetcher: HttpFetcher, download_dir: PathBuf, max_bytes: u64) -> Self {
        Self {
            fetcher,
            download_dir,
            max_bytes,
        }
    }

    pub async fn info(&self, url: &str) -> NinjaResult<MediaInfo> {
        let html = self.fetcher.get_text(url).await?;
        let src = extract_video_src(&html)
            .ok_or_else(|| MediaError::NotFound("No video found".to_string()))?;
        // Relative and protocol-relative sources are resolved against the page
        let media_url = Url::parse(url)
            .and_then(|page| page.join(&src))
            .map(String::from)
            .unwrap_or(src);

        Ok(MediaInfo {
            title: "Facebook Video".to_string(),
            thumbnail: String::new(),
            is_video: true,
            media_url,
            shortcode: None,
        })
    }

    pub async fn download(&self, url: &str) -> NinjaResult<DownloadResult> {
        let media = self.info(url).await?;

        let download_id = uuid::Uuid::new_v4().to_string();
        let filename = format!("{}.mp4", file_stem(&download_id));
        let dest = self.download_dir.join(&filename);

        let bytes = self
            .fetcher
            .stream_to_file(&media.media_url, &dest, self.max_bytes)
            .await?;
        info!("Facebook download {} finished ({} bytes)", download_id, bytes);

        Ok(DownloadResult::new(download_id, filename, media.title))
    }
}
