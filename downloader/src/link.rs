/// Platform detection for submitted URLs.
///
/// Matching is done on the parsed host, so a query string mentioning
/// `youtube.com` does not make an arbitrary site look like YouTube.
use ninjax_shared::models::Platform;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static INSTAGRAM_SHORTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"instagram\.com/(?:p|reel|reels|tv)/([^/?#]+)").unwrap()
});

static SPOTIFY_TRACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:spotify\.com/(?:intl-[a-z]+/)?track/|spotify:track:)([a-zA-Z0-9]+)").unwrap()
});

static YOUTUBE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/|live/)|youtu\.be/)([a-zA-Z0-9_-]{11})"
    ).unwrap()
});

/// Registrable domains per platform.
const PLATFORM_DOMAINS: &[(Platform, &[&str])] = &[
    (Platform::Youtube, &["youtube.com", "youtu.be", "youtube-nocookie.com"]),
    (Platform::Instagram, &["instagram.com"]),
    (Platform::Facebook, &["facebook.com", "fb.watch", "fb.com"]),
    (Platform::Spotify, &["spotify.com"]),
    (Platform::Jiosaavn, &["jiosaavn.com"]),
];

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Detect which platform a URL belongs to.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    PLATFORM_DOMAINS
        .iter()
        .find(|(_, domains)| domains.iter().any(|d| host_matches(&host, d)))
        .map(|(platform, _)| *platform)
}

/// Whether `url` is served by `platform`.
pub fn is_platform(url: &str, platform: Platform) -> bool {
    detect_platform(url) == Some(platform)
}

/// Shortcode of an Instagram post, reel or IGTV URL.
pub fn instagram_shortcode(url: &str) -> Option<String> {
    INSTAGRAM_SHORTCODE_RE
        .captures(url)
        .map(|cap| cap[1].to_string())
}

/// Track id from an `open.spotify.com/track/...` URL or a `spotify:track:` URI.
pub fn spotify_track_id(url: &str) -> Option<String> {
    SPOTIFY_TRACK_RE.captures(url).map(|cap| cap[1].to_string())
}

/// Rewrite a `spotify:track:<id>` URI as its `open.spotify.com` URL.
///
/// Anything else is returned unchanged.
pub fn normalize_spotify_uri(input: &str) -> String {
    match input.trim().strip_prefix("spotify:track:") {
        Some(id) if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("https://open.spotify.com/track/{}", id)
        }
        _ => input.to_string(),
    }
}

/// Eleven-character YouTube video id, when the URL carries one.
pub fn youtube_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID_RE.captures(url).map(|cap| cap[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_spotify_uri() {
        assert_eq!(
            normalize_spotify_uri("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"
        );
        assert_eq!(normalize_spotify_uri("spotify:track:bad/../id"), "spotify:track:bad/../id");
        assert_eq!(normalize_spotify_uri("spotify:album:abc"), "spotify:album:abc");
        assert_eq!(
            normalize_spotify_uri("https://open.spotify.com/track/abc"),
            "https://open.spotify.com/track/abc"
        );
    }

    #[test]
    fn test_detect_youtube() {
        assert_eq!(detect_platform("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some(Platform::Youtube));
        assert_eq!(detect_platform("https://youtu.be/dQw4w9WgXcQ"), Some(Platform::Youtube));
        assert_eq!(detect_platform("https://music.youtube.com/watch?v=dQw4w9WgXcQ"), Some(Platform::Youtube));
    }

    #[test]
    fn test_detect_other_platforms() {
        assert_eq!(detect_platform("https://www.instagram.com/p/CxYz123/"), Some(Platform::Instagram));
        assert_eq!(detect_platform("https://www.facebook.com/watch/?v=123"), Some(Platform::Facebook));
        assert_eq!(detect_platform("https://fb.watch/abc/"), Some(Platform::Facebook));
        assert_eq!(detect_platform("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"), Some(Platform::Spotify));
    }

    #[test]
    fn test_query_string_does_not_fake_platform() {
        assert_eq!(detect_platform("https://example.com/?next=youtube.com"), None);
        assert_eq!(detect_platform("https://notyoutube.com/watch?v=dQw4w9WgXcQ"), None);
        assert!(!is_platform("https://example.com/instagram.com/p/abc", Platform::Instagram));
    }

    #[test]
    fn test_instagram_shortcode() {
        assert_eq!(instagram_shortcode("https://www.instagram.com/p/CxYz123/").as_deref(), Some("CxYz123"));
        assert_eq!(instagram_shortcode("https://instagram.com/reel/Abc_-9?igsh=1").as_deref(), Some("Abc_-9"));
        assert_eq!(instagram_shortcode("https://www.instagram.com/tv/B1c2D3/").as_deref(), Some("B1c2D3"));
        assert_eq!(instagram_shortcode("https://www.instagram.com/someuser/"), None);
    }

    #[test]
    fn test_spotify_track_id() {
        assert_eq!(
            spotify_track_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x").as_deref(),
            Some("4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(spotify_track_id("spotify:track:4uLU6hMCjMI75M1A2tKUQC").as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(spotify_track_id("https://open.spotify.com/album/xyz"), None);
    }

    #[test]
    fn test_youtube_video_id() {
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://www.youtube.com/shorts/abc123def45").as_deref(), Some("abc123def45"));
        assert_eq!(youtube_video_id("https://www.youtube.com/playlist?list=PL123"), None);
    }
}
