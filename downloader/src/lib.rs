//! NinjaX media downloaders.
//!
//! One downloader per platform, all writing into the same download folder.
//! YouTube and Instagram go through yt-dlp; Facebook, JioSaavn and Spotify
//! metadata are fetched over plain HTTP.
pub mod facebook;
pub mod fetch;
pub mod instagram;
pub mod jiosaavn;
pub mod link;
pub mod spotify;
pub mod youtube;
pub mod ytdlp;

use std::path::PathBuf;
use std::sync::Arc;

use ninjax_shared::cookies::CookieStore;
use ninjax_shared::errors::NinjaResult;
use ninjax_shared::models::Platform;

use crate::facebook::FacebookDownloader;
use crate::fetch::HttpFetcher;
use crate::instagram::InstagramDownloader;
use crate::jiosaavn::JioSaavnClient;
use crate::spotify::SpotifyClient;
use crate::youtube::YoutubeDownloader;
use crate::ytdlp::YtDlp;

/// Settings shared by every downloader.
#[derive(Debug, Clone)]
pub struct DownloaderSettings {
    pub ytdlp_bin: String,
    pub timeout_secs: u64,
    pub download_dir: PathBuf,
    pub max_download_bytes: u64,
}

/// All platform downloaders, wired to one yt-dlp handle and the loaded cookies.
pub struct Downloaders {
    pub youtube: YoutubeDownloader,
    pub instagram: InstagramDownloader,
    pub facebook: FacebookDownloader,
    pub jiosaavn: JioSaavnClient,
    pub spotify: SpotifyClient,
}

impl Downloaders {
    pub fn new(settings: &DownloaderSettings, cookies: &CookieStore) -> NinjaResult<Self> {
        let ytdlp = Arc::new(YtDlp::new(settings.ytdlp_bin.clone(), settings.timeout_secs));
        let cookie_path = |p: Platform| cookies.path(p).map(PathBuf::from);
        let dir = settings.download_dir.clone();

        Ok(Self {
            youtube: YoutubeDownloader::new(ytdlp.clone(), cookie_path(Platform::Youtube), dir.clone()),
            instagram: InstagramDownloader::new(
                ytdlp.clone(),
                HttpFetcher::new(cookies.jar(Platform::Instagram))?,
                cookie_path(Platform::Instagram),
                dir.clone(),
                settings.max_download_bytes,
            ),
            facebook: FacebookDownloader::new(
                HttpFetcher::new(cookies.jar(Platform::Facebook))?,
                dir.clone(),
                settings.max_download_bytes,
            ),
            jiosaavn: JioSaavnClient::new(HttpFetcher::new(None)?),
            spotify: SpotifyClient::new(HttpFetcher::new(None)?, ytdlp, dir),
        })
    }
}
