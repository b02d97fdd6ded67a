/// Spotify tracks.
///
/// Spotify serves no downloadable audio, so the track title is looked up via
/// oEmbed and the audio is taken from the top YouTube search hit.
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use ninjax_shared::errors::{MediaError, NinjaResult};
use ninjax_shared::models::{file_stem, DownloadResult, TrackInfo};

use crate::fetch::HttpFetcher;
use crate::link::spotify_track_id;
use crate::youtube::file_name;
use crate::ytdlp::{DownloadSpec, FormatChoice, YtDlp};

pub const DEFAULT_OEMBED_BASE: &str = "https://open.spotify.com/oembed";

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

pub struct SpotifyClient {
    fetcher: HttpFetcher,
    oembed_base: String,
    ytdlp: Arc<YtDlp>,
    download_dir: PathBuf,
}

impl SpotifyClient {
    pub fn new(fetcher: HttpFetcher, ytdlp: Arc<YtDlp>, download_dir: PathBuf) -> Self {
        Self::with_oembed_base(fetcher, ytdlp, download_dir, DEFAULT_OEMBED_BASE)
    }

    pub fn with_oembed_base(
        fetcher: HttpFetcher,
        ytdlp: Arc<YtDlp>,
        download_dir: PathBuf,
        oembed_base: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            oembed_base: oembed_base.into(),
            ytdlp,
            download_dir,
        }
    }

    pub async fn info(&self, url: &str) -> NinjaResult<TrackInfo> {
        let track_id = spotify_track_id(url)
            .ok_or_else(|| MediaError::NotFound("Invalid Spotify URL".to_string()))?;
        let track_url = format!("https://open.spotify.com/track/{}", track_id);
        let embed: OEmbed = self
            .fetcher
            .get_json(&self.oembed_base, &[("url", track_url.as_str())])
            .await?;

        Ok(TrackInfo {
            track_id,
            title: embed.title,
            artist: None,
            thumbnail: embed.thumbnail_url,
        })
    }

    pub async fn download(&self, url: &str) -> NinjaResult<DownloadResult> {
        let track = self.info(url).await?;

        let download_id = uuid::Uuid::new_v4().to_string();
        let spec = DownloadSpec {
            output_dir: self.download_dir.clone(),
            stem: file_stem(&download_id),
            format: FormatChoice::Mp3,
        };
        info!("Spotify download {} via search for {:?}", download_id, track.title);

        let file = self
            .ytdlp
            .download(&search_query(&track.title), &spec, None)
            .await?;

        Ok(DownloadResult::new(download_id, file_name(&file.path), track.title))
    }
}

/// yt-dlp pseudo-URL for the first YouTube search hit.
pub(crate) fn search_query(title: &str) -> String {
    format!("ytsearch1:{}", title)
}
