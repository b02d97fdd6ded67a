/// YouTube metadata and downloads through yt-dlp.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use ninjax_shared::errors::NinjaResult;
use ninjax_shared::models::{file_stem, DownloadResult, FormatKind, FormatOption, VideoInfo, AUDIO_QUALITY};

use crate::link::youtube_video_id;
use crate::ytdlp::{DownloadSpec, FormatChoice, YtDlp, YtDlpInfo};

/// Build the client-facing listing from yt-dlp metadata.
///
/// One entry per distinct video height (first format wins), then the MP3 entry.
pub fn video_info(info: &YtDlpInfo) -> VideoInfo {
    let mut formats = Vec::new();
    let mut seen_qualities = HashSet::new();

    for fmt in &info.formats {
        let Some(height) = fmt.height.filter(|_| fmt.has_video()) else {
            continue;
        };
        let quality = format!("{}p", height);
        if seen_qualities.insert(quality.clone()) {
            formats.push(FormatOption {
                format_id: fmt.format_id.clone(),
                quality,
                filesize: fmt.filesize.unwrap_or(0.0) as u64,
                ext: fmt.ext.clone().unwrap_or_else(|| "mp4".to_string()),
                kind: FormatKind::Video,
            });
        }
    }

    formats.push(FormatOption::mp3(info.filesize.unwrap_or(0.0) as u64));

    VideoInfo {
        title: info.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: info.thumbnail.clone().unwrap_or_default(),
        duration: info.duration.unwrap_or(0.0) as u64,
        uploader: info.uploader.clone().unwrap_or_else(|| "Unknown".to_string()),
        formats,
    }
}

pub struct YoutubeDownloader {
    ytdlp: Arc<YtDlp>,
    cookies: Option<PathBuf>,
    download_dir: PathBuf,
}

impl YoutubeDownloader {
    pub fn new(ytdlp: Arc<YtDlp>, cookies: Option<PathBuf>, download_dir: PathBuf) -> Self {
        Self {
            ytdlp,
            cookies,
            download_dir,
        }
    }

    pub async fn info(&self, url: &str) -> NinjaResult<VideoInfo> {
        let info = self.ytdlp.probe(url, self.cookies.as_deref()).await?;
        Ok(video_info(&info))
    }

    /// Download `url` in the requested format; quality `MP3` extracts audio.
    pub async fn download(&self, url: &str, format_id: &str, quality: &str) -> NinjaResult<DownloadResult> {
        let download_id = uuid::Uuid::new_v4().to_string();
        let format = if quality == AUDIO_QUALITY {
            FormatChoice::Mp3
        } else {
            FormatChoice::Format(format_id.to_string())
        };
        let spec = DownloadSpec {
            output_dir: self.download_dir.clone(),
            stem: file_stem(&download_id),
            format,
        };

        info!(
            "YouTube download {} (video={:?}, quality={})",
            download_id,
            youtube_video_id(url),
            quality
        );
        let file = self.ytdlp.download(url, &spec, self.cookies.as_deref()).await?;

        Ok(DownloadResult::new(
            download_id,
            file_name(&file.path),
            file.title.unwrap_or_else(|| "video".to_string()),
        ))
    }
}

pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> YtDlpInfo {
        serde_json::from_str(
            r#"{
            "title": "Never Gonna Give You Up",
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "duration": 212,
            "uploader": "Rick Astley",
            "filesize": 5000000,
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "filesize": 3400000},
                {"format_id": "160", "ext": "mp4", "vcodec": "avc1.4d400c", "height": 144, "filesize": 1000},
                {"format_id": "278", "ext": "webm", "vcodec": "vp9", "height": 144, "filesize": 900},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "height": 1080},
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "height": 45}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_video_info_dedups_by_height() {
        let info = video_info(&sample());
        let qualities: Vec<&str> = info.formats.iter().map(|f| f.quality.as_str()).collect();
        assert_eq!(qualities, vec!["144p", "1080p", "MP3"]);
        assert_eq!(info.formats[0].format_id, "160");
        assert_eq!(info.formats[1].filesize, 0);
    }

    #[test]
    fn test_video_info_audio_entry() {
        let info = video_info(&sample());
        let mp3 = info.formats.last().unwrap();
        assert_eq!(mp3.format_id, "bestaudio/best");
        assert_eq!(mp3.kind, FormatKind::Audio);
        assert_eq!(mp3.filesize, 5_000_000);
        assert_eq!(info.duration, 212);
        assert_eq!(info.uploader, "Rick Astley");
    }

    #[test]
    fn test_video_info_defaults() {
        let info = video_info(&YtDlpInfo::default());
        assert_eq!(info.title, "Unknown");
        assert_eq!(info.uploader, "Unknown");
        assert_eq!(info.thumbnail, "");
        assert_eq!(info.formats.len(), 1);
    }
}
