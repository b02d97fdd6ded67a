/// Wire models shared across all NinjaX crates.
use serde::{Deserialize, Serialize};

use crate::job_slots::SlotStats;

/// Prefix of every file the service writes into the download folder.
pub const FILE_PREFIX: &str = "Downloader_NinjaX_";

/// Pseudo-quality selecting an MP3 audio extraction.
pub const AUDIO_QUALITY: &str = "MP3";

/// yt-dlp format selector used for audio extraction.
pub const AUDIO_FORMAT_ID: &str = "bestaudio/best";

/// MP3 bitrate in kbit/s.
pub const MP3_BITRATE: &str = "192";

/// Desktop user agent sent on plain HTTP fetches.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Media platform a URL belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Instagram,
    Facebook,
    Spotify,
    Jiosaavn,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Spotify => "spotify",
            Platform::Jiosaavn => "jiosaavn",
        }
    }

    /// Human-readable name used in client-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Spotify => "Spotify",
            Platform::Jiosaavn => "JioSaavn",
        }
    }

    /// Name of the cookie export file for this platform, if it takes one.
    pub fn cookie_file_name(&self) -> Option<&'static str> {
        match self {
            Platform::Youtube => Some("youtube_cookies.txt"),
            Platform::Instagram => Some("instagram_cookies.txt"),
            Platform::Facebook => Some("facebook_cookies.txt"),
            Platform::Spotify | Platform::Jiosaavn => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a format carries a video stream or audio only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Video,
    Audio,
}

/// A selectable download format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatOption {
    pub format_id: String,
    pub quality: String,
    pub filesize: u64,
    pub ext: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
}

impl FormatOption {
    /// The MP3 entry appended to every YouTube format list.
    pub fn mp3(filesize: u64) -> Self {
        Self {
            format_id: AUDIO_FORMAT_ID.to_string(),
            quality: AUDIO_QUALITY.to_string(),
            filesize,
            ext: "mp3".to_string(),
            kind: FormatKind::Audio,
        }
    }
}

/// YouTube video metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: String,
    pub duration: u64,
    pub uploader: String,
    pub formats: Vec<FormatOption>,
}

/// Single media item (Instagram post, Facebook video).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: String,
    pub is_video: bool,
    pub media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcode: Option<String>,
}

impl MediaInfo {
    /// File extension the media is stored under.
    pub fn extension(&self) -> &'static str {
        if self.is_video {
            "mp4"
        } else {
            "jpg"
        }
    }
}

/// Completed download, as returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub download_id: String,
    pub filename: String,
    pub title: String,
    pub download_url: String,
}

impl DownloadResult {
    pub fn new(download_id: impl Into<String>, filename: impl Into<String>, title: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            download_id: download_id.into(),
            download_url: format!("/api/download/{}", filename),
            filename,
            title: title.into(),
        }
    }
}

/// JioSaavn search hit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SongResult {
    pub id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<String>,
    pub image: Option<String>,
    pub download_url: Option<String>,
}

/// Spotify track metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub downloads: SlotStats,
}

/// Stem (file name without extension) for a fresh download id.
pub fn file_stem(download_id: &str) -> String {
    crate::validation::sanitize_filename(&format!("{}{}", FILE_PREFIX, download_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_option_type_field() {
        let json = serde_json::to_value(FormatOption::mp3(0)).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["quality"], "MP3");
        assert_eq!(json["format_id"], "bestaudio/best");
    }

    #[test]
    fn test_download_result_url() {
        let r = DownloadResult::new("abc", "Downloader_NinjaX_abc.mp4", "clip");
        assert_eq!(r.download_url, "/api/download/Downloader_NinjaX_abc.mp4");
    }

    #[test]
    fn test_cookie_file_names() {
        assert_eq!(Platform::Youtube.cookie_file_name(), Some("youtube_cookies.txt"));
        assert_eq!(Platform::Facebook.cookie_file_name(), Some("facebook_cookies.txt"));
        assert_eq!(Platform::Spotify.cookie_file_name(), None);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("1234"), "Downloader_NinjaX_1234");
    }
}
