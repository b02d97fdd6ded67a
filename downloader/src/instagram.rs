/// Instagram posts, reels and IGTV.
///
/// Metadata comes from yt-dlp; the media itself is fetched directly so image
/// posts work the same way as videos.
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use ninjax_shared::errors::{MediaError, NinjaResult};
use ninjax_shared::models::{file_stem, DownloadResult, MediaInfo};

use crate::fetch::HttpFetcher;
use crate::link::instagram_shortcode;
use crate::ytdlp::{YtDlp, YtDlpInfo};

const CAPTION_TITLE_CHARS: usize = 100;

/// Map yt-dlp metadata for a post to [`MediaInfo`].
pub fn media_info(info: &YtDlpInfo, shortcode: &str) -> NinjaResult<MediaInfo> {
    let is_video = info.is_video();
    let thumbnail = info.thumbnail.clone().unwrap_or_default();

    let media_url = (if is_video {
        info.url.clone().or_else(|| {
            info.formats
                .iter()
                .rev()
                .filter(|f| f.has_video())
                .find_map(|f| f.url.clone())
        })
    } else {
        info.url.clone().or_else(|| info.thumbnail.clone())
    })
    .ok_or_else(|| MediaError::NotFound("No media found in post".to_string()))?;

    let title = info
        .description
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.chars().take(CAPTION_TITLE_CHARS).collect())
        .unwrap_or_else(|| "Instagram Media".to_string());

    Ok(MediaInfo {
        title,
        thumbnail,
        is_video,
        media_url,
        shortcode: Some(shortcode.to_string()),
    })
}

pub struct InstagramDownloader {
    ytdlp: Arc<YtDlp>,
    fetcher: HttpFetcher,
    cookies: Option<PathBuf>,
    download_dir: PathBuf,
    max_bytes: u64,
}

impl InstagramDownloader {
    pub fn new(
        ytdlp: Arc<YtDlp>,
        fetcher: HttpFetcher,
        cookies: Option<PathBuf>,
        download_dir: PathBuf,
        max_bytes: u64,
    ) -> Self {
        Self {
            ytdlp,
            fetcher,
            cookies,
            download_dir,
            max_bytes,
        }
    }

    pub async fn info(&self, url: &str) -> NinjaResult<MediaInfo> {
        let shortcode = instagram_shortcode(url)
            .ok_or_else(|| MediaError::NotFound("Invalid Instagram URL".to_string()))?;
        let post_url = format!("https://www.instagram.com/p/{}/", shortcode);
        let info = self.ytdlp.probe(&post_url, self.cookies.as_deref()).await?;
        media_info(&info, &shortcode)
    }

    pub async fn download(&self, url: &str) -> NinjaResult<DownloadResult> {
        let media = self.info(url).await?;

        let download_id = uuid::Uuid::new_v4().to_string();
        let filename = format!("{}.{}", file_stem(&download_id), media.extension());
        let dest = self.download_dir.join(&filename);

        let bytes = self
            .fetcher
            .stream_to_file(&media.media_url, &dest, self.max_bytes)
            .await?;
        info!("Instagram download {} finished ({} bytes)", download_id, bytes);

        Ok(DownloadResult::new(download_id, filename, media.title))
    }
}
